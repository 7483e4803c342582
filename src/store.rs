use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{PennyError, Result};
use crate::models::{RawTable, RecordDraft, COLUMNS, TIMESTAMP_FORMAT};

pub const LEDGER_FILE: &str = "expenses.csv";

/// Source of truth for transaction rows. Reads hand back the whole table
/// loosely typed; the engine normalizes it.
pub trait RecordStore: Send + Sync {
    fn read_all(&self) -> Result<RawTable>;

    /// Append one record and return its new id.
    fn append(&self, draft: &RecordDraft) -> Result<i64>;

    /// `Ok(false)` when no row carries `id`.
    fn update(&self, id: i64, draft: &RecordDraft) -> Result<bool>;

    /// `Ok(false)` when no row carries `id`.
    fn delete(&self, id: i64) -> Result<bool>;

    /// Append in one write; returns how many rows were added.
    fn append_many(&self, drafts: &[RecordDraft]) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Table edits shared by both stores
// ---------------------------------------------------------------------------

fn now_stamp() -> String {
    chrono::Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string()
}

/// Re-lay a table onto the canonical column set, padding missing cells.
fn canonical(table: RawTable) -> RawTable {
    if table.columns.iter().map(|c| c.trim()).eq(COLUMNS.iter().copied()) {
        let mut table = table;
        for row in &mut table.rows {
            row.resize(COLUMNS.len(), String::new());
        }
        return table;
    }
    let positions: Vec<Option<usize>> = COLUMNS.iter().map(|c| table.column_index(c)).collect();
    let mut out = RawTable::new(COLUMNS.iter().copied());
    for (n, row) in table.rows.iter().enumerate() {
        let mut cells: Vec<String> = positions
            .iter()
            .map(|p| p.and_then(|i| row.get(i)).cloned().unwrap_or_default())
            .collect();
        // Same sequential ids the normalizer hands out for an id-less table.
        if positions[0].is_none() {
            cells[0] = (n + 1).to_string();
        }
        out.rows.push(cells);
    }
    out
}

fn row_id(row: &[String]) -> Option<i64> {
    row.first().and_then(|c| c.trim().parse().ok())
}

fn next_id(table: &RawTable) -> i64 {
    table.rows.iter().filter_map(|r| row_id(r)).max().unwrap_or(0) + 1
}

fn push_drafts(table: &mut RawTable, drafts: &[RecordDraft]) -> i64 {
    let stamp = now_stamp();
    let mut id = next_id(table);
    let mut last = 0;
    for draft in drafts {
        table.rows.push(draft.to_row(id, &stamp, &stamp));
        last = id;
        id += 1;
    }
    last
}

fn replace_row(table: &mut RawTable, id: i64, draft: &RecordDraft) -> bool {
    let Some(row) = table.rows.iter_mut().find(|r| row_id(r) == Some(id)) else {
        return false;
    };
    let stamp = now_stamp();
    let created_at = match row.get(8).map(|c| c.trim()) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => stamp.clone(),
    };
    *row = draft.to_row(id, &created_at, &stamp);
    true
}

fn remove_row(table: &mut RawTable, id: i64) -> bool {
    let before = table.rows.len();
    table.rows.retain(|r| row_id(r) != Some(id));
    table.rows.len() != before
}

// ---------------------------------------------------------------------------
// CsvStore
// ---------------------------------------------------------------------------

/// Ledger kept as one CSV file. Every mutation rewrites the file through a
/// temp file and a rename.
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(LEDGER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the data dir and an empty ledger with the header row, unless
    /// a ledger already exists.
    pub fn init(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&RawTable::new(COLUMNS.iter().copied()))
    }

    fn load(&self) -> Result<RawTable> {
        if !self.path.exists() {
            return Ok(RawTable::new(COLUMNS.iter().copied()));
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let mut table = RawTable::new(rdr.headers()?.iter());
        let mut unreadable = 0usize;
        for result in rdr.records() {
            let Ok(record) = result else {
                unreadable += 1;
                continue;
            };
            table.push_row(record.iter());
        }
        if unreadable > 0 {
            tracing::warn!(unreadable, path = %self.path.display(), "skipped unreadable ledger lines");
        }
        Ok(table)
    }

    fn save(&self, table: &RawTable) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut w = csv::Writer::from_path(&tmp)?;
            w.write_record(&table.columns)?;
            for row in &table.rows {
                w.write_record(row)?;
            }
            w.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn edit<T>(&self, f: impl FnOnce(&mut RawTable) -> T) -> Result<T> {
        let _guard = self.write_lock.lock();
        let mut table = canonical(self.load()?);
        let out = f(&mut table);
        self.save(&table)?;
        Ok(out)
    }
}

impl RecordStore for CsvStore {
    fn read_all(&self) -> Result<RawTable> {
        self.load()
    }

    fn append(&self, draft: &RecordDraft) -> Result<i64> {
        self.edit(|t| push_drafts(t, std::slice::from_ref(draft)))
    }

    fn update(&self, id: i64, draft: &RecordDraft) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut table = canonical(self.load()?);
        if !replace_row(&mut table, id, draft) {
            return Ok(false);
        }
        self.save(&table)?;
        Ok(true)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut table = canonical(self.load()?);
        if !remove_row(&mut table, id) {
            return Ok(false);
        }
        self.save(&table)?;
        Ok(true)
    }

    fn append_many(&self, drafts: &[RecordDraft]) -> Result<usize> {
        if drafts.is_empty() {
            return Ok(0);
        }
        self.edit(|t| {
            push_drafts(t, drafts);
            drafts.len()
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store with the same contract as `CsvStore`. The failure
/// switch makes every call return `PennyError::Store`.
pub struct MemoryStore {
    table: Mutex<RawTable>,
    failing: AtomicBool,
    reads: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_table(RawTable::new(COLUMNS.iter().copied()))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: RawTable) -> Self {
        Self {
            table: Mutex::new(table),
            failing: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    /// Rows in canonical column order.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let mut table = RawTable::new(COLUMNS.iter().copied());
        table.rows = rows;
        Self::from_table(table)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful `read_all` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PennyError::Store("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn edit<T>(&self, f: impl FnOnce(&mut RawTable) -> T) -> Result<T> {
        self.check()?;
        let mut table = self.table.lock();
        if table.columns.iter().map(|c| c.trim()).ne(COLUMNS.iter().copied()) {
            *table = canonical(std::mem::take(&mut *table));
        }
        Ok(f(&mut table))
    }
}

impl RecordStore for MemoryStore {
    fn read_all(&self) -> Result<RawTable> {
        self.check()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.lock().clone())
    }

    fn append(&self, draft: &RecordDraft) -> Result<i64> {
        self.edit(|t| push_drafts(t, std::slice::from_ref(draft)))
    }

    fn update(&self, id: i64, draft: &RecordDraft) -> Result<bool> {
        self.edit(|t| replace_row(t, id, draft))
    }

    fn delete(&self, id: i64) -> Result<bool> {
        self.edit(|t| remove_row(t, id))
    }

    fn append_many(&self, drafts: &[RecordDraft]) -> Result<usize> {
        self.edit(|t| {
            push_drafts(t, drafts);
            drafts.len()
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{draft, row};
    use super::*;
    use crate::normalizer::normalize;

    fn test_store() -> (tempfile::TempDir, CsvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::in_dir(&dir.path().join("data"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_reads_as_empty_table() {
        let (_dir, store) = test_store();
        let table = store.read_all().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), COLUMNS.len());
    }

    #[test]
    fn test_init_writes_header_once() {
        let (_dir, store) = test_store();
        store.init().unwrap();
        store.append(&draft("Food", 10.0)).unwrap();
        store.init().unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("id,date,type,category,sub_category"));
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let (_dir, store) = test_store();
        assert_eq!(store.append(&draft("Food", 10.0)).unwrap(), 1);
        assert_eq!(store.append(&draft("Rent", 900.0)).unwrap(), 2);
        store.delete(1).unwrap();
        assert_eq!(store.append(&draft("Fuel", 40.0)).unwrap(), 3);

        let records = normalize(&store.read_all().unwrap());
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(records[1].category, "Fuel");
    }

    #[test]
    fn test_update_preserves_created_at() {
        let (_dir, store) = test_store();
        let id = store.append(&draft("Food", 10.0)).unwrap();
        let before = normalize(&store.read_all().unwrap())[0].created_at;

        let changed = RecordDraft { amount: 12.5, notes: "corrected".to_string(), ..draft("Food", 0.0) };
        assert!(store.update(id, &changed).unwrap());

        let after = &normalize(&store.read_all().unwrap())[0];
        assert_eq!(after.created_at, before);
        assert_eq!(after.amount, 12.5);
        assert_eq!(after.notes, "corrected");
    }

    #[test]
    fn test_update_and_delete_unknown_id() {
        let (_dir, store) = test_store();
        store.append(&draft("Food", 10.0)).unwrap();
        assert!(!store.update(99, &draft("Food", 1.0)).unwrap());
        assert!(!store.delete(99).unwrap());
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_notes_with_commas_survive() {
        let (_dir, store) = test_store();
        let d = RecordDraft { notes: "milk, eggs, \"bread\"".to_string(), ..draft("Food", 3.0) };
        store.append(&d).unwrap();
        let records = normalize(&store.read_all().unwrap());
        assert_eq!(records[0].notes, "milk, eggs, \"bread\"");
    }

    #[test]
    fn test_foreign_column_order_is_rewritten_canonically() {
        let (_dir, store) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "amount,date,category\n25,2024-02-01,Food\n").unwrap();

        store.append(&draft("Rent", 800.0)).unwrap();
        let table = store.read_all().unwrap();
        assert_eq!(table.columns, COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        let records = normalize(&table);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(records[0].category, "Food");
        assert_eq!(records[0].amount, 25.0);
        assert_eq!(records[1].category, "Rent");
    }

    #[test]
    fn test_append_many_writes_once() {
        let (_dir, store) = test_store();
        let n = store
            .append_many(&[draft("Food", 1.0), draft("Food", 2.0), draft("Food", 3.0)])
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(store.append_many(&[]).unwrap(), 0);
        let ids: Vec<i64> = normalize(&store.read_all().unwrap()).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_memory_store_failure_switch() {
        let store = MemoryStore::from_rows(vec![row(1, "2024-01-05", "Expense", "Food", "50")]);
        store.set_failing(true);
        assert!(matches!(store.read_all(), Err(PennyError::Store(_))));
        assert!(store.append(&draft("Food", 1.0)).is_err());
        store.set_failing(false);
        assert_eq!(store.append(&draft("Food", 1.0)).unwrap(), 2);
        assert_eq!(store.read_count(), 0);
        store.read_all().unwrap();
        assert_eq!(store.read_count(), 1);
    }
}
