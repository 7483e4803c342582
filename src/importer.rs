use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::ExpenseEngine;
use crate::error::{PennyError, Result};
use crate::models::{RecordDraft, TransactionType, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::normalizer::{clean_text, parse_date};

pub const IMPORT_LOG_FILE: &str = "imports.json";

const BANK_MODE: &str = "Bank Transfer";
const SIGNATURE_NOTE_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub duplicate_file: bool,
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Dedup key: date, amount, and the first 50 characters of the notes.
fn signature(date: &str, amount: f64, notes: &str) -> String {
    let head: String = notes.chars().take(SIGNATURE_NOTE_CHARS).collect();
    format!("{date}_{amount}_{head}")
}

// ---------------------------------------------------------------------------
// Import log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntry {
    pub filename: String,
    pub checksum: String,
    pub record_count: usize,
    pub imported_at: String,
}

/// Checksums of statements already imported, kept as JSON beside the ledger.
pub struct ImportLog {
    path: PathBuf,
}

impl ImportLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(IMPORT_LOG_FILE))
    }

    pub fn entries(&self) -> Result<Vec<ImportEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn contains(&self, checksum: &str) -> Result<bool> {
        Ok(self.entries()?.iter().any(|e| e.checksum == checksum))
    }

    fn record(&self, entry: ImportEntry) -> Result<()> {
        let mut entries = self.entries()?;
        entries.push(entry);
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, format!("{json}\n"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Statement parsing
// ---------------------------------------------------------------------------

struct StatementColumns {
    date: usize,
    kind: Option<usize>,
    amount: usize,
    description: Option<usize>,
    category: Option<usize>,
    subcategory: Option<usize>,
}

impl StatementColumns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let required = |name: &str| {
            find(name).ok_or_else(|| PennyError::Other(format!("statement is missing the '{name}' column")))
        };
        Ok(Self {
            date: required("date")?,
            kind: find("transaction_type"),
            amount: required("amount")?,
            description: find("description"),
            category: find("category"),
            subcategory: find("subcategory"),
        })
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn parse_row(record: &csv::StringRecord, cols: &StatementColumns) -> std::result::Result<RecordDraft, String> {
    let raw_date = field(record, Some(cols.date));
    let date = parse_date(raw_date).ok_or_else(|| format!("unparseable date '{}'", raw_date.trim()))?;

    let raw_amount = field(record, Some(cols.amount));
    let amount = raw_amount
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite() && *a != 0.0)
        .ok_or_else(|| format!("unparseable amount '{}'", raw_amount.trim()))?
        .abs();

    let transaction_type = if field(record, cols.kind).trim() == "credit" {
        TransactionType::Income
    } else {
        TransactionType::Expense
    };

    Ok(RecordDraft {
        date,
        transaction_type,
        category: clean_text(field(record, cols.category)),
        sub_category: clean_text(field(record, cols.subcategory)),
        transaction_mode: BANK_MODE.to_string(),
        amount,
        notes: clean_text(field(record, cols.description)),
    })
}

/// Import a pre-labelled statement CSV (`date, transaction_type, amount,
/// description, category, subcategory`).
///
/// Rows already in the ledger, or repeated within the file, are skipped.
/// Bad rows are reported in `errors` and never abort the import.
pub fn import_statement(engine: &ExpenseEngine, log: &ImportLog, file_path: &Path) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    if log.contains(&checksum)? {
        tracing::info!(file = %file_path.display(), "statement already imported");
        return Ok(ImportResult {
            duplicate_file: true,
            ..ImportResult::default()
        });
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(file_path)?;
    let cols = StatementColumns::locate(rdr.headers()?)?;

    let mut seen: HashSet<String> = engine
        .get_all()
        .iter()
        .map(|r| signature(&r.date.format(DATE_FORMAT).to_string(), r.amount, &r.notes))
        .collect();

    let mut result = ImportResult::default();
    let mut drafts = Vec::new();
    let mut rows = 0usize;

    for (i, rec) in rdr.records().enumerate() {
        rows += 1;
        let record = match rec {
            Ok(r) => r,
            Err(e) => {
                result.errors.push(format!("Row {}: {e}", i + 1));
                continue;
            }
        };
        let draft = match parse_row(&record, &cols) {
            Ok(d) => d,
            Err(e) => {
                result.errors.push(format!("Row {}: {e}", i + 1));
                continue;
            }
        };
        let sig = signature(&draft.date.format(DATE_FORMAT).to_string(), draft.amount, &draft.notes);
        if !seen.insert(sig) {
            result.skipped += 1;
            continue;
        }
        drafts.push(draft);
    }

    if rows == 0 {
        result.errors.push("Statement has no rows".to_string());
        return Ok(result);
    }

    // Statement rows skip draft validation; a blank category is allowed here.
    result.imported = engine.import_drafts(&drafts)?;

    log.record(ImportEntry {
        filename: file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string(),
        checksum,
        record_count: rows,
        imported_at: chrono::Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string(),
    })?;

    tracing::info!(
        imported = result.imported,
        skipped = result.skipped,
        errors = result.errors.len(),
        "statement imported"
    );
    Ok(result)
}
