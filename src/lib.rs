//! Cached, filtered views over an expense ledger.
//!
//! Records flow from a [`store::RecordStore`] through the
//! [`normalizer`] into a two-tier [`cache::SnapshotCache`]. The
//! [`engine::ExpenseEngine`] filters snapshots directly or, for large ones,
//! on a chunked [`worker::BackgroundFilter`]; both paths return the same
//! records in the same order.

pub mod cache;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fmt;
pub mod importer;
pub mod limiter;
pub mod models;
pub mod normalizer;
pub mod settings;
pub mod store;
pub mod summary;
pub mod synthetic;
pub mod worker;

pub use engine::{EngineConfig, ExpenseEngine};
pub use error::{PennyError, Result};
pub use filter::{AmountRange, DateFilter, DatePreset, FilterCriteria};
pub use models::{RecordDraft, TransactionRecord, TransactionType};
