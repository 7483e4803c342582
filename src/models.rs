use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical column set of the ledger table, in storage order.
pub const COLUMNS: &[&str] = &[
    "id",
    "date",
    "type",
    "category",
    "sub_category",
    "transaction_mode",
    "amount",
    "notes",
    "created_at",
    "updated_at",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Transaction type vocabulary after ingest. `Credit`/`Debit` are kept as
/// written so a filter on either label still matches; anything outside the
/// vocabulary is folded into `Expense` by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Expense,
    Income,
    Credit,
    Debit,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [Self::Expense, Self::Income, Self::Credit, Self::Debit];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Expense => "Expense",
            Self::Income => "Income",
            Self::Credit => "Credit",
            Self::Debit => "Debit",
        }
    }

    /// Exact, case-sensitive match on the stored label.
    pub fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == raw.trim())
    }

    /// Money coming in (`Income`, `Credit`) as opposed to going out.
    pub fn is_inflow(&self) -> bool {
        matches!(self, Self::Income | Self::Credit)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown transaction type: {s}"))
    }
}

/// One financial event, fully populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub category: String,
    pub sub_category: String,
    pub transaction_mode: String,
    pub amount: f64,
    pub notes: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Caller-supplied fields for a new or updated record. The store assigns
/// `id` and the timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub category: String,
    pub sub_category: String,
    pub transaction_mode: String,
    pub amount: f64,
    pub notes: String,
}

impl RecordDraft {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.category.trim().is_empty() {
            errors.push("Category is required".to_string());
        }
        if self.sub_category.trim().is_empty() {
            errors.push("Sub-category is required".to_string());
        }
        if !(self.amount > 0.0) {
            errors.push("Amount must be greater than 0".to_string());
        }
        if self.transaction_mode.trim().is_empty() {
            errors.push("Transaction mode is required".to_string());
        }
        errors
    }

    /// Render as a storage row in `COLUMNS` order.
    pub fn to_row(&self, id: i64, created_at: &str, updated_at: &str) -> Vec<String> {
        vec![
            id.to_string(),
            self.date.format(DATE_FORMAT).to_string(),
            self.transaction_type.label().to_string(),
            self.category.clone(),
            self.sub_category.clone(),
            self.transaction_mode.clone(),
            self.amount.to_string(),
            self.notes.clone(),
            created_at.to_string(),
            updated_at.to_string(),
        ]
    }
}

/// Loosely-typed table as handed over by a record store: column names plus
/// rows of raw strings. Rows may be shorter than the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.trim() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
