use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::cache::{Clock, SnapshotCache, SystemClock};
use crate::error::{PennyError, Result};
use crate::filter::{apply, FilterCriteria, FilterPlan};
use crate::models::{RecordDraft, TransactionRecord};
use crate::settings::Settings;
use crate::store::RecordStore;
use crate::summary::{summarize, ExpenseSummary};
use crate::synthetic::SyntheticDataPolicy;
use crate::worker::{BackgroundFilter, FilterJob, BASE_CHUNK_SIZE, MAX_CHUNK_SIZE};

pub const BACKGROUND_THRESHOLD: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub cache_ttl: Duration,
    /// Snapshots larger than this are filtered on the worker thread.
    pub background_threshold: usize,
    pub base_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: crate::cache::DEFAULT_TTL,
            background_threshold: BACKGROUND_THRESHOLD,
            base_chunk_size: BASE_CHUNK_SIZE,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }
}

impl From<&Settings> for EngineConfig {
    fn from(s: &Settings) -> Self {
        Self {
            cache_ttl: Duration::from_secs(s.cache_ttl_secs),
            background_threshold: s.background_threshold,
            base_chunk_size: s.base_chunk_size,
            max_chunk_size: s.max_chunk_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Direct,
    Background,
}

/// Cached, filtered access to one record store.
pub struct ExpenseEngine {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    cache: SnapshotCache,
    worker: BackgroundFilter,
    config: EngineConfig,
    policy: SyntheticDataPolicy,
}

impl ExpenseEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            cache: SnapshotCache::new(Arc::clone(&store), Arc::clone(&clock), config.cache_ttl),
            worker: BackgroundFilter::new(config.base_chunk_size, config.max_chunk_size),
            store,
            clock,
            config,
            policy: SyntheticDataPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyntheticDataPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get_all(&self) -> Vec<TransactionRecord> {
        self.cache.get_raw()
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    pub fn cache_is_warm(&self) -> bool {
        self.cache.is_warm()
    }

    pub fn is_filtering(&self) -> bool {
        self.worker.is_running()
    }

    pub fn execution_path(&self, snapshot_len: usize, criteria: &FilterCriteria) -> ExecutionPath {
        if snapshot_len > self.config.background_threshold && !criteria.is_empty() {
            ExecutionPath::Background
        } else {
            ExecutionPath::Direct
        }
    }

    /// Filter the current snapshot, on the worker thread when it is large.
    /// Both paths return the same records in the same order.
    pub fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<TransactionRecord>> {
        self.filter_with_progress(criteria, |_| {})
    }

    /// Like `filter`; `on_progress` sees the worker's progress, or a single
    /// 100 when the direct path runs.
    pub fn filter_with_progress(
        &self,
        criteria: &FilterCriteria,
        mut on_progress: impl FnMut(u8),
    ) -> Result<Vec<TransactionRecord>> {
        let snapshot = self.cache.get_processed();
        match self.execution_path(snapshot.len(), criteria) {
            ExecutionPath::Direct => {
                tracing::debug!(records = snapshot.len(), "filtering directly");
                let out = apply(&snapshot, criteria, self.today());
                on_progress(100);
                Ok(out)
            }
            ExecutionPath::Background => {
                tracing::debug!(records = snapshot.len(), "filtering on worker thread");
                self.start_job(snapshot, criteria).wait_with_progress(on_progress)
            }
        }
    }

    pub fn get_filtered(&self, criteria: &FilterCriteria) -> Result<Vec<TransactionRecord>> {
        self.filter(criteria)
    }

    /// Always runs on the worker. Iterate the job for progress followed by
    /// the result, or call `wait`. Starting another job supersedes this one.
    pub fn get_filtered_async(&self, criteria: &FilterCriteria) -> FilterJob {
        self.start_job(self.cache.get_processed(), criteria)
    }

    fn start_job(&self, snapshot: Arc<Vec<TransactionRecord>>, criteria: &FilterCriteria) -> FilterJob {
        let plan = Arc::new(FilterPlan::new(criteria, self.today()));
        self.worker.start(snapshot, plan)
    }

    pub fn get_by_id(&self, id: i64) -> Option<TransactionRecord> {
        self.get_all().into_iter().find(|r| r.id == id)
    }

    /// Case-insensitive substring match on the text fields.
    pub fn search(&self, term: &str) -> Vec<TransactionRecord> {
        let term = term.trim().to_lowercase();
        let records = self.get_all();
        if term.is_empty() {
            return records;
        }
        records
            .into_iter()
            .filter(|r| {
                [&r.category, &r.sub_category, &r.notes, &r.transaction_mode]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            })
            .collect()
    }

    pub fn subcategories_for(&self, categories: &[String]) -> Vec<String> {
        let wanted: BTreeSet<&str> = categories.iter().map(String::as_str).collect();
        let subs: BTreeSet<String> = self
            .get_all()
            .into_iter()
            .filter(|r| wanted.contains(r.category.as_str()) && !r.sub_category.trim().is_empty())
            .map(|r| r.sub_category)
            .collect();
        subs.into_iter().collect()
    }

    pub fn category_pairs(&self) -> Vec<(String, String)> {
        let pairs: BTreeSet<(String, String)> = self
            .get_all()
            .into_iter()
            .filter(|r| !r.category.trim().is_empty() && !r.sub_category.trim().is_empty())
            .map(|r| (r.category, r.sub_category))
            .collect();
        pairs.into_iter().collect()
    }

    pub fn summary(&self) -> ExpenseSummary {
        summarize(&self.get_all(), &self.policy, self.today())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn check(draft: &RecordDraft) -> Result<()> {
        let errors = draft.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PennyError::Validation(errors))
        }
    }

    pub fn add_record(&self, draft: &RecordDraft) -> Result<i64> {
        Self::check(draft)?;
        let id = self.store.append(draft)?;
        self.cache.invalidate();
        tracing::info!(id, category = %draft.category, amount = draft.amount, "record added");
        Ok(id)
    }

    /// Validates every draft before writing any of them.
    pub fn add_records(&self, drafts: &[RecordDraft]) -> Result<usize> {
        for draft in drafts {
            Self::check(draft)?;
        }
        let added = self.store.append_many(drafts)?;
        if added > 0 {
            self.cache.invalidate();
            tracing::info!(added, "records added");
        }
        Ok(added)
    }

    /// Bulk write for imported rows, which carry no draft validation.
    pub(crate) fn import_drafts(&self, drafts: &[RecordDraft]) -> Result<usize> {
        let added = self.store.append_many(drafts)?;
        if added > 0 {
            self.cache.invalidate();
        }
        Ok(added)
    }

    pub fn update_record(&self, id: i64, draft: &RecordDraft) -> Result<()> {
        Self::check(draft)?;
        if !self.store.update(id, draft)? {
            return Err(PennyError::UnknownRecord(id));
        }
        self.cache.invalidate();
        tracing::info!(id, "record updated");
        Ok(())
    }

    pub fn delete_record(&self, id: i64) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(PennyError::UnknownRecord(id));
        }
        self.cache.invalidate();
        tracing::info!(id, "record deleted");
        Ok(())
    }
}
