use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::models::TransactionRecord;
use crate::normalizer::{normalize, prepare_for_filtering};
use crate::store::RecordStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Time source for cache validity and relative date presets.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A snapshot held in memory. The payload is shared read-only; nothing
/// mutates it after capture.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Arc<Vec<TransactionRecord>>,
    pub captured_at: Instant,
}

impl CacheEntry {
    pub fn is_valid(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.captured_at) < ttl
    }
}

#[derive(Default)]
struct Tiers {
    raw: Option<CacheEntry>,
    processed: Option<CacheEntry>,
}

/// Two-tier read-through cache over a record store.
///
/// Both tiers share the raw entry's `captured_at`, so they expire together,
/// and `invalidate` clears both. The lock is held across a store read on a
/// miss: a concurrent reader sees either the old snapshot or the new one,
/// never a mix.
pub struct SnapshotCache {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    tiers: Mutex<Tiers>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            tiers: Mutex::new(Tiers::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn raw_entry(&self, tiers: &mut Tiers) -> CacheEntry {
        let now = self.clock.now();
        if let Some(entry) = &tiers.raw {
            if entry.is_valid(now, self.ttl) {
                tracing::debug!("raw snapshot cache hit");
                return entry.clone();
            }
        }

        let records = match self.store.read_all() {
            Ok(table) => normalize(&table),
            Err(e) => {
                // Not cached: the next read retries the store.
                tracing::warn!(error = %e, "record store read failed; serving empty snapshot");
                tiers.raw = None;
                tiers.processed = None;
                return CacheEntry {
                    payload: Arc::new(Vec::new()),
                    captured_at: now,
                };
            }
        };
        tracing::debug!(records = records.len(), "raw snapshot refreshed from store");

        let entry = CacheEntry {
            payload: Arc::new(records),
            captured_at: now,
        };
        tiers.raw = Some(entry.clone());
        tiers.processed = None;
        entry
    }

    /// Normalized snapshot, as an owned copy the caller may do anything with.
    pub fn get_raw(&self) -> Vec<TransactionRecord> {
        let mut tiers = self.tiers.lock();
        self.raw_entry(&mut tiers).payload.as_ref().clone()
    }

    /// Filter-ready snapshot, shared read-only.
    pub fn get_processed(&self) -> Arc<Vec<TransactionRecord>> {
        let mut tiers = self.tiers.lock();
        let now = self.clock.now();
        if let Some(entry) = &tiers.processed {
            if entry.is_valid(now, self.ttl) {
                tracing::debug!("processed snapshot cache hit");
                return Arc::clone(&entry.payload);
            }
        }

        let raw = self.raw_entry(&mut tiers);
        let entry = CacheEntry {
            payload: Arc::new(prepare_for_filtering(&raw.payload)),
            captured_at: raw.captured_at,
        };
        // A failed store read leaves the raw tier empty; keep processed in step.
        if tiers.raw.is_some() {
            tiers.processed = Some(entry.clone());
        }
        entry.payload
    }

    pub fn invalidate(&self) {
        let mut tiers = self.tiers.lock();
        tiers.raw = None;
        tiers.processed = None;
        tracing::debug!("snapshot cache invalidated");
    }

    /// Whether a valid raw snapshot is currently held.
    pub fn is_warm(&self) -> bool {
        let tiers = self.tiers.lock();
        let now = self.clock.now();
        tiers.raw.as_ref().is_some_and(|e| e.is_valid(now, self.ttl))
    }
}
