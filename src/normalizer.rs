use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{RawTable, TransactionRecord, TransactionType, DATE_FORMAT, TIMESTAMP_FORMAT};

/// Cell values that mean "nothing here" in exported spreadsheets.
const NULL_MARKERS: &[&str] = &["nan", "NaN", "None", "none", "null", "NULL", "<NA>", "NaT"];

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> f64 {
    let s = raw
        .replace(',', "")
        .replace('"', "")
        .replace('$', "")
        .replace('\u{20b9}', "");
    let s = s.trim();
    let value = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        -inner.trim().parse::<f64>().unwrap_or(0.0)
    } else {
        s.parse().unwrap_or(0.0)
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn parse_date_mdy(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Accepts `YYYY-MM-DD`, an ISO timestamp (space or `T` separated) or
/// `MM/DD/YYYY`. Anything else is unparseable.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(d);
    }
    for fmt in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    parse_date_mdy(raw)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

pub fn clean_text(raw: &str) -> String {
    let s = raw.trim();
    if NULL_MARKERS.contains(&s) {
        String::new()
    } else {
        s.to_string()
    }
}

/// Unknown or missing labels become `Expense`.
pub fn normalize_type(raw: &str) -> TransactionType {
    TransactionType::from_label(&clean_text(raw)).unwrap_or(TransactionType::Expense)
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

struct ColumnMap {
    id: Option<usize>,
    date: Option<usize>,
    kind: Option<usize>,
    category: Option<usize>,
    sub_category: Option<usize>,
    transaction_mode: Option<usize>,
    amount: Option<usize>,
    notes: Option<usize>,
    created_at: Option<usize>,
    updated_at: Option<usize>,
}

impl ColumnMap {
    fn for_table(table: &RawTable) -> Self {
        Self {
            id: table.column_index("id"),
            date: table.column_index("date"),
            kind: table.column_index("type"),
            category: table.column_index("category"),
            sub_category: table.column_index("sub_category"),
            transaction_mode: table.column_index("transaction_mode"),
            amount: table.column_index("amount"),
            notes: table.column_index("notes"),
            created_at: table.column_index("created_at"),
            updated_at: table.column_index("updated_at"),
        }
    }
}

fn cell(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("")
}

/// Coerce a raw table into canonical records, preserving row order.
///
/// Rows with an unparseable date, an unparseable id, or a non-positive
/// amount are dropped. Nothing here fails: a table with no usable rows
/// yields an empty vector.
pub fn normalize(table: &RawTable) -> Vec<TransactionRecord> {
    if table.is_empty() {
        return Vec::new();
    }

    let cols = ColumnMap::for_table(table);
    for (name, idx) in [("id", cols.id), ("date", cols.date), ("type", cols.kind), ("amount", cols.amount)] {
        if idx.is_none() {
            tracing::warn!(column = name, "ledger table is missing a required column");
        }
    }

    let mut records = Vec::with_capacity(table.len());
    let mut dropped = 0usize;
    let mut unidentified = 0usize;

    for (i, row) in table.rows.iter().enumerate() {
        let id = match cols.id {
            None => i as i64 + 1,
            Some(_) => match cell(row, cols.id).trim().parse::<i64>() {
                Ok(id) => id,
                Err(_) => {
                    unidentified += 1;
                    continue;
                }
            },
        };

        let amount = parse_amount(cell(row, cols.amount));
        let Some(date) = parse_date(cell(row, cols.date)) else {
            dropped += 1;
            continue;
        };
        if amount <= 0.0 {
            dropped += 1;
            continue;
        }

        let transaction_type = match cols.kind {
            None => TransactionType::Expense,
            Some(_) => normalize_type(cell(row, cols.kind)),
        };

        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let created_at = parse_timestamp(cell(row, cols.created_at)).unwrap_or(midnight);
        let updated_at = parse_timestamp(cell(row, cols.updated_at)).unwrap_or(created_at);

        records.push(TransactionRecord {
            id,
            date,
            transaction_type,
            category: clean_text(cell(row, cols.category)),
            sub_category: clean_text(cell(row, cols.sub_category)),
            transaction_mode: clean_text(cell(row, cols.transaction_mode)),
            amount,
            notes: clean_text(cell(row, cols.notes)),
            created_at,
            updated_at,
        });
    }

    // Such rows could never be updated or deleted by id.
    if unidentified > 0 {
        tracing::warn!(unidentified, "dropped ledger rows without a usable id");
    }
    if dropped > 0 {
        tracing::debug!(dropped, kept = records.len(), "normalizer dropped malformed rows");
    }
    records
}

/// Second-tier preparation for the filter predicates. Normalized records are
/// already typed, so this only re-asserts the predicate preconditions
/// (finite positive amount, null-free strings) on a record set.
pub fn prepare_for_filtering(records: &[TransactionRecord]) -> Vec<TransactionRecord> {
    records
        .iter()
        .filter(|r| r.amount.is_finite() && r.amount > 0.0)
        .map(|r| TransactionRecord {
            category: clean_text(&r.category),
            sub_category: clean_text(&r.sub_category),
            transaction_mode: clean_text(&r.transaction_mode),
            notes: clean_text(&r.notes),
            ..r.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::COLUMNS;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn full_table(rows: &[[&str; 10]]) -> RawTable {
        let mut t = RawTable::new(COLUMNS.iter().copied());
        for r in rows {
            t.push_row(r.iter().copied());
        }
        t
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), 1234.56);
        assert_eq!(parse_amount("\"500.00\""), 500.0);
        assert_eq!(parse_amount("\u{20b9}250"), 250.0);
        assert_eq!(parse_amount("(50.00)"), -50.0);
        assert_eq!(parse_amount("not_a_number"), 0.0);
        assert_eq!(parse_amount("inf"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-05"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05 13:45:00"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05T13:45:00"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("01/15/2025"), Some(d(2025, 1, 15)));
        assert_eq!(parse_date("02/30/2025"), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_clean_text_collapses_null_markers() {
        assert_eq!(clean_text("  Food "), "Food");
        assert_eq!(clean_text("nan"), "");
        assert_eq!(clean_text("None"), "");
        assert_eq!(clean_text("Nancy"), "Nancy");
    }

    #[test]
    fn test_normalize_drops_zero_amount_and_bad_dates() {
        let table = full_table(&[
            ["1", "2024-01-05", "Expense", "Food", "Lunch", "Cash", "50", "", "", ""],
            ["2", "2024-01-10", "Income", "Salary", "Monthly", "Bank Transfer", "1000", "", "", ""],
            ["3", "2024-01-05", "Expense", "Food", "Lunch", "Cash", "0", "", "", ""],
            ["4", "not a date", "Expense", "Food", "Lunch", "Cash", "10", "", "", ""],
            ["5", "2024-01-06", "Expense", "Food", "Lunch", "Cash", "-3", "", "", ""],
        ]);
        let records = normalize(&table);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(records[1].transaction_type, TransactionType::Income);
        assert_eq!(records[0].date, d(2024, 1, 5));
    }

    #[test]
    fn test_normalize_rewrites_unknown_types_to_expense() {
        let table = full_table(&[
            ["1", "2024-01-05", "Transfer", "Misc", "Move", "Cash", "5", "", "", ""],
            ["2", "2024-01-05", "Credit", "Refund", "Store", "Cash", "5", "", "", ""],
            ["3", "2024-01-05", "", "Misc", "Move", "Cash", "5", "", "", ""],
        ]);
        let kinds: Vec<TransactionType> = normalize(&table).iter().map(|r| r.transaction_type).collect();
        assert_eq!(
            kinds,
            vec![TransactionType::Expense, TransactionType::Credit, TransactionType::Expense]
        );
    }

    #[test]
    fn test_normalize_fills_missing_columns() {
        let mut table = RawTable::new(["date", "amount", "category"]);
        table.push_row(["2024-03-01", "12.5", "Food"]);
        table.push_row(["2024-03-02", "7", "nan"]);
        let records = normalize(&table);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[0].transaction_type, TransactionType::Expense);
        assert_eq!(records[0].sub_category, "");
        assert_eq!(records[1].category, "");
        assert_eq!(records[0].created_at, d(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_normalize_tolerates_short_rows() {
        let mut table = RawTable::new(COLUMNS.iter().copied());
        table.push_row(["9", "2024-02-02", "Expense", "Food"]);
        table.push_row(["10", "2024-02-02", "Expense", "Food", "Snacks", "Cash", "4"]);
        let records = normalize(&table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 10);
        assert_eq!(records[0].notes, "");
    }

    #[test]
    fn test_normalize_drops_unparseable_ids() {
        let table = full_table(&[
            ["x", "2024-01-05", "Expense", "Food", "Lunch", "Cash", "50", "", "", ""],
            ["2", "2024-01-05", "Expense", "Food", "Lunch", "Cash", "50", "", "", ""],
            ["", "2024-01-06", "Expense", "Food", "Lunch", "Cash", "75", "", "", ""],
            ["  ", "2024-01-07", "Income", "Salary", "Monthly", "Bank", "900", "", "", ""],
        ]);
        let records = normalize(&table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 2);
    }

    #[test]
    fn test_normalize_parses_timestamps() {
        let table = full_table(&[[
            "1", "2024-01-05", "Expense", "Food", "Lunch", "Cash", "50", "note",
            "2024-01-05 09:30:00", "2024-01-06 10:00:00",
        ]]);
        let r = &normalize(&table)[0];
        assert_eq!(r.created_at, d(2024, 1, 5).and_hms_opt(9, 30, 0).unwrap());
        assert_eq!(r.updated_at, d(2024, 1, 6).and_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn test_normalize_empty_table() {
        assert!(normalize(&RawTable::default()).is_empty());
    }

    #[test]
    fn test_prepare_for_filtering_is_idempotent() {
        let table = full_table(&[
            ["1", "2024-01-05", "Expense", "Food", "Lunch", "Cash", "50", "", "", ""],
            ["2", "2024-01-10", "Income", "Salary", "Monthly", "Bank Transfer", "1000", "", "", ""],
        ]);
        let raw = normalize(&table);
        let once = prepare_for_filtering(&raw);
        assert_eq!(once, raw);
        assert_eq!(prepare_for_filtering(&once), once);
    }
}
