pub mod demo;
pub mod import;
pub mod init;
pub mod list;
pub mod records;
pub mod search;
pub mod status;
pub mod summary;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use penny::fmt::{clip, money};
use penny::models::{TransactionRecord, DATE_FORMAT};
use penny::settings::{load_settings, Settings};
use penny::store::CsvStore;
use penny::{EngineConfig, ExpenseEngine};

#[derive(Parser)]
#[command(name = "penny", about = "Filtered, cached views over a personal expense ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Penny: choose a data directory and create the ledger.
    Init {
        /// Path for Penny data (default: ~/Documents/penny)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Add a record to the ledger.
    Add(RecordArgs),
    /// Update a record; omitted fields keep their current value.
    Update {
        /// Record ID (shown in `penny list`)
        id: i64,
        #[command(flatten)]
        fields: UpdateArgs,
    },
    /// Delete a record by ID.
    Delete {
        /// Record ID (shown in `penny list`)
        id: i64,
    },
    /// List records matching the given filters.
    List(ListArgs),
    /// Find records whose category, sub-category or notes contain a term.
    Search {
        /// Case-insensitive search term
        term: String,
    },
    /// Show totals and a per-category breakdown.
    Summary,
    /// Import a bank statement CSV.
    Import {
        /// Path to the statement CSV
        file: String,
    },
    /// Add generated sample records to explore Penny.
    Demo {
        /// Number of records to generate
        #[arg(long, default_value = "1200")]
        count: usize,
    },
    /// Show the current ledger and settings.
    Status,
}

#[derive(Args)]
pub struct RecordArgs {
    /// Date: YYYY-MM-DD (default: today)
    #[arg(long)]
    pub date: Option<String>,
    /// Type: Expense, Income, Credit, Debit
    #[arg(long = "type", default_value = "Expense")]
    pub kind: String,
    #[arg(long)]
    pub category: String,
    #[arg(long = "sub-category")]
    pub sub_category: String,
    /// How it was paid, e.g. Cash, Card, UPI
    #[arg(long, default_value = "Cash")]
    pub mode: String,
    #[arg(long)]
    pub amount: f64,
    #[arg(long, default_value = "")]
    pub notes: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long = "type")]
    pub kind: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long = "sub-category")]
    pub sub_category: Option<String>,
    #[arg(long)]
    pub mode: Option<String>,
    #[arg(long)]
    pub amount: Option<f64>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Preset: today, this_week, last_week, this_month, last_month, this_year
    #[arg(long, conflicts_with_all = ["from", "to", "last_days"])]
    pub date: Option<String>,
    /// Range start: YYYY-MM-DD (needs --to)
    #[arg(long = "from", requires = "to")]
    pub from: Option<String>,
    /// Range end: YYYY-MM-DD (needs --from)
    #[arg(long = "to", requires = "from")]
    pub to: Option<String>,
    /// Only the last N days, ending today
    #[arg(long = "last-days", conflicts_with_all = ["from", "to"])]
    pub last_days: Option<u32>,
    /// Transaction type to include (repeatable)
    #[arg(long = "type")]
    pub types: Vec<String>,
    /// Select no transaction types at all
    #[arg(long = "no-types", conflicts_with = "types")]
    pub no_types: bool,
    #[arg(long)]
    pub min: Option<f64>,
    #[arg(long)]
    pub max: Option<f64>,
    /// Category to include (repeatable)
    #[arg(long)]
    pub category: Vec<String>,
    /// Sub-category to include (repeatable)
    #[arg(long = "sub-category")]
    pub sub_category: Vec<String>,
    /// Rows to show (default: result_limit setting)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Times to extend the visible rows by the load-more step
    #[arg(long, default_value = "0")]
    pub more: usize,
    /// Report filtering progress on stderr
    #[arg(long)]
    pub progress: bool,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub(crate) fn open_engine(settings: &Settings) -> ExpenseEngine {
    let store = CsvStore::in_dir(&PathBuf::from(&settings.data_dir));
    ExpenseEngine::new(Arc::new(store), EngineConfig::from(settings))
}

pub(crate) fn load_engine() -> (Settings, ExpenseEngine) {
    let settings = load_settings();
    let engine = open_engine(&settings);
    (settings, engine)
}

pub(crate) fn records_table(records: &[TransactionRecord], symbol: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["ID", "Date", "Type", "Category", "Sub-category", "Mode", "Amount", "Notes"]);
    for r in records {
        let amount = money(r.amount, symbol);
        let amount = if r.transaction_type.is_inflow() {
            amount.green().to_string()
        } else {
            amount.red().to_string()
        };
        table.add_row(vec![
            r.id.to_string(),
            r.date.format(DATE_FORMAT).to_string(),
            r.transaction_type.label().to_string(),
            r.category.clone(),
            r.sub_category.clone(),
            r.transaction_mode.clone(),
            amount,
            clip(&r.notes, 40),
        ]);
    }
    table
}
