use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::error::{PennyError, Result};
use crate::filter::FilterPlan;
use crate::models::TransactionRecord;

pub const BASE_CHUNK_SIZE: usize = 1000;
pub const MAX_CHUNK_SIZE: usize = 5000;

/// Chunk counts above this double the chunk size, up to the cap.
const TARGET_CHUNKS: usize = 10;

const PROGRESS_STARTED: u8 = 10;
const PROGRESS_CAPTURED: u8 = 30;
const PROGRESS_CHUNK_SPAN: usize = 60;
const PROGRESS_DONE: u8 = 100;

/// What a running job reports back to its handle.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEvent {
    Progress(u8),
    Completed(Vec<TransactionRecord>),
    Failed(String),
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Superseded,
}

/// Per-chunk filter step run on the worker thread.
pub trait ChunkFilter: Send + Sync {
    fn filter_chunk(&self, chunk: &[TransactionRecord]) -> Result<Vec<TransactionRecord>>;
}

impl ChunkFilter for FilterPlan {
    fn filter_chunk(&self, chunk: &[TransactionRecord]) -> Result<Vec<TransactionRecord>> {
        Ok(self.run(chunk))
    }
}

/// Chunk length for a snapshot of `total` records. Small snapshots run as
/// one chunk; large ones start at `base` and double while that would leave
/// more than `TARGET_CHUNKS` chunks, never past `cap`.
pub fn chunk_size(total: usize, base: usize, cap: usize) -> usize {
    let base = base.max(1);
    let cap = cap.max(base);
    if total <= base {
        return total.max(1);
    }
    let mut size = base;
    while size < cap && total.div_ceil(size) > TARGET_CHUNKS {
        size = (size * 2).min(cap);
    }
    size
}

// ---------------------------------------------------------------------------
// Job handle
// ---------------------------------------------------------------------------

/// Caller's end of one background job. Iterating yields progress events
/// followed by exactly one terminal event.
pub struct FilterJob {
    generation: u64,
    latest: Arc<AtomicU64>,
    events: Receiver<FilterEvent>,
    status: JobStatus,
}

impl FilterJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    fn is_stale(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.generation
    }

    /// Block until the job ends. Only a completed, still-current job yields
    /// records; partial output is never returned.
    pub fn wait(self) -> Result<Vec<TransactionRecord>> {
        self.wait_with_progress(|_| {})
    }

    pub fn wait_with_progress(mut self, mut on_progress: impl FnMut(u8)) -> Result<Vec<TransactionRecord>> {
        for event in self.by_ref() {
            match event {
                FilterEvent::Progress(p) => on_progress(p),
                FilterEvent::Completed(records) => return Ok(records),
                FilterEvent::Failed(msg) => return Err(PennyError::Worker(msg)),
                FilterEvent::Superseded => return Err(PennyError::Superseded),
            }
        }
        match self.status {
            JobStatus::Superseded => Err(PennyError::Superseded),
            _ => Err(PennyError::Worker("job already finished".to_string())),
        }
    }
}

impl Iterator for FilterJob {
    type Item = FilterEvent;

    fn next(&mut self) -> Option<FilterEvent> {
        if self.status != JobStatus::Running {
            return None;
        }
        let event = if self.is_stale() {
            FilterEvent::Superseded
        } else {
            match self.events.recv() {
                // A newer job may have started while this one was blocked.
                Ok(_) if self.is_stale() => FilterEvent::Superseded,
                Ok(event) => event,
                Err(_) => FilterEvent::Failed("worker exited without a result".to_string()),
            }
        };
        self.status = match &event {
            FilterEvent::Progress(_) => JobStatus::Running,
            FilterEvent::Completed(_) => JobStatus::Completed,
            FilterEvent::Failed(_) => JobStatus::Failed,
            FilterEvent::Superseded => JobStatus::Superseded,
        };
        Some(event)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct ActiveJob {
    generation: u64,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Runs at most one chunked filter job at a time. Starting a job cancels
/// and joins the previous one first.
pub struct BackgroundFilter {
    base_chunk_size: usize,
    max_chunk_size: usize,
    latest: Arc<AtomicU64>,
    active: Mutex<Option<ActiveJob>>,
}

impl Default for BackgroundFilter {
    fn default() -> Self {
        Self::new(BASE_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }
}

impl BackgroundFilter {
    pub fn new(base_chunk_size: usize, max_chunk_size: usize) -> Self {
        Self {
            base_chunk_size,
            max_chunk_size,
            latest: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|job| !job.handle.is_finished())
    }

    pub fn start(&self, snapshot: Arc<Vec<TransactionRecord>>, filter: Arc<dyn ChunkFilter>) -> FilterJob {
        let mut active = self.active.lock();
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(prev) = active.take() {
            prev.cancel.store(true, Ordering::SeqCst);
            tracing::debug!(superseded = prev.generation, by = generation, "superseding filter job");
            if prev.handle.join().is_err() {
                tracing::warn!(generation = prev.generation, "superseded filter job panicked");
            }
        }

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let chunk = chunk_size(snapshot.len(), self.base_chunk_size, self.max_chunk_size);
        let job_cancel = Arc::clone(&cancel);
        let handle = std::thread::spawn(move || {
            run_job(generation, &snapshot, filter.as_ref(), chunk, &job_cancel, &tx);
        });

        *active = Some(ActiveJob {
            generation,
            cancel,
            handle,
        });
        FilterJob {
            generation,
            latest: Arc::clone(&self.latest),
            events: rx,
            status: JobStatus::Running,
        }
    }
}

impl Drop for BackgroundFilter {
    fn drop(&mut self) {
        if let Some(job) = self.active.get_mut().take() {
            job.cancel.store(true, Ordering::SeqCst);
            let _ = job.handle.join();
        }
    }
}

fn run_job(
    generation: u64,
    snapshot: &[TransactionRecord],
    filter: &dyn ChunkFilter,
    chunk: usize,
    cancel: &AtomicBool,
    tx: &Sender<FilterEvent>,
) {
    // Sends fail only once the handle is dropped; nobody is listening then.
    let outcome = catch_unwind(AssertUnwindSafe(|| filter_in_chunks(snapshot, filter, chunk, cancel, tx)));
    let event = match outcome {
        Ok(Ok(Some(records))) => {
            tracing::debug!(generation, matched = records.len(), "filter job completed");
            let _ = tx.send(FilterEvent::Progress(PROGRESS_DONE));
            FilterEvent::Completed(records)
        }
        Ok(Ok(None)) => {
            tracing::debug!(generation, "filter job stopped after supersession");
            FilterEvent::Superseded
        }
        Ok(Err(e)) => {
            tracing::error!(generation, error = %e, "filter job failed");
            FilterEvent::Failed(e.to_string())
        }
        Err(_) => {
            tracing::error!(generation, "filter job panicked");
            FilterEvent::Failed("filter worker panicked".to_string())
        }
    };
    let _ = tx.send(event);
}

/// `Ok(None)` when cancelled between chunks.
fn filter_in_chunks(
    snapshot: &[TransactionRecord],
    filter: &dyn ChunkFilter,
    chunk: usize,
    cancel: &AtomicBool,
    tx: &Sender<FilterEvent>,
) -> Result<Option<Vec<TransactionRecord>>> {
    let _ = tx.send(FilterEvent::Progress(PROGRESS_STARTED));
    let chunks: Vec<&[TransactionRecord]> = snapshot.chunks(chunk).collect();
    let total = chunks.len();
    tracing::debug!(records = snapshot.len(), chunks = total, chunk, "filter job started");
    let _ = tx.send(FilterEvent::Progress(PROGRESS_CAPTURED));

    let mut matched: Vec<Vec<TransactionRecord>> = Vec::new();
    for (i, part) in chunks.into_iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let found = filter.filter_chunk(part)?;
        if !found.is_empty() {
            matched.push(found);
        }
        let pct = PROGRESS_CAPTURED as usize + PROGRESS_CHUNK_SPAN * (i + 1) / total;
        let _ = tx.send(FilterEvent::Progress(pct as u8));
    }

    if cancel.load(Ordering::SeqCst) {
        return Ok(None);
    }
    Ok(Some(matched.into_iter().flatten().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{apply, FilterCriteria};
    use crate::models::TransactionType;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn synthetic(n: i64) -> Arc<Vec<TransactionRecord>> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Arc::new(
            (1..=n)
                .map(|id| {
                    let date = base + chrono::Duration::days(id % 180);
                    TransactionRecord {
                        id,
                        date,
                        transaction_type: if id % 4 == 0 {
                            TransactionType::Income
                        } else {
                            TransactionType::Expense
                        },
                        category: if id % 3 == 0 { "Food" } else { "Travel" }.to_string(),
                        sub_category: "Misc".to_string(),
                        transaction_mode: "Cash".to_string(),
                        amount: (id % 500 + 1) as f64,
                        notes: String::new(),
                        created_at: date.and_hms_opt(0, 0, 0).unwrap(),
                        updated_at: date.and_hms_opt(0, 0, 0).unwrap(),
                    }
                })
                .collect(),
        )
    }

    struct FailOnChunk(usize, AtomicU64);

    impl ChunkFilter for FailOnChunk {
        fn filter_chunk(&self, chunk: &[TransactionRecord]) -> Result<Vec<TransactionRecord>> {
            if self.1.fetch_add(1, Ordering::SeqCst) as usize == self.0 {
                return Err(PennyError::Other("bad chunk".to_string()));
            }
            Ok(chunk.to_vec())
        }
    }

    struct Panics;

    impl ChunkFilter for Panics {
        fn filter_chunk(&self, _chunk: &[TransactionRecord]) -> Result<Vec<TransactionRecord>> {
            panic!("boom");
        }
    }

    struct Slow;

    impl ChunkFilter for Slow {
        fn filter_chunk(&self, chunk: &[TransactionRecord]) -> Result<Vec<TransactionRecord>> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(chunk.to_vec())
        }
    }

    #[test]
    fn test_chunk_size_schedule() {
        assert_eq!(chunk_size(0, 1000, 5000), 1);
        assert_eq!(chunk_size(600, 1000, 5000), 600);
        assert_eq!(chunk_size(1000, 1000, 5000), 1000);
        assert_eq!(chunk_size(8000, 1000, 5000), 1000);
        assert_eq!(chunk_size(12_000, 1000, 5000), 2000);
        assert_eq!(chunk_size(45_000, 1000, 5000), 5000);
        assert_eq!(chunk_size(1_000_000, 1000, 5000), 5000);
    }

    #[test]
    fn test_reassembly_matches_direct_order_for_12000_records() {
        let snapshot = synthetic(12_000);
        let criteria = FilterCriteria::new()
            .with_categories(["Food"])
            .with_types([TransactionType::Expense]);
        let expected = apply(&snapshot, &criteria, today());
        let expected_ids: Vec<i64> = (1..=12_000).filter(|id| id % 3 == 0 && id % 4 != 0).collect();
        assert_eq!(expected.iter().map(|r| r.id).collect::<Vec<_>>(), expected_ids);

        for (base, cap) in [(1000, 5000), (7, 7), (333, 1000), (12_000, 12_000)] {
            let worker = BackgroundFilter::new(base, cap);
            let plan = Arc::new(FilterPlan::new(&criteria, today()));
            let got = worker.start(snapshot.clone(), plan).wait().unwrap();
            assert_eq!(got, expected, "chunking {base}/{cap}");
        }
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_at_100() {
        let worker = BackgroundFilter::new(100, 100);
        let plan = Arc::new(FilterPlan::new(&FilterCriteria::new().with_categories(["Food"]), today()));
        let mut seen = Vec::new();
        let result = worker
            .start(synthetic(950), plan)
            .wait_with_progress(|p| seen.push(p))
            .unwrap();
        assert_eq!(result.len(), 316);
        assert_eq!(seen.first(), Some(&10));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
    }

    #[test]
    fn test_empty_snapshot_completes_empty() {
        let worker = BackgroundFilter::default();
        let plan = Arc::new(FilterPlan::new(&FilterCriteria::new(), today()));
        let mut job = worker.start(Arc::new(Vec::new()), plan);
        let events: Vec<FilterEvent> = job.by_ref().collect();
        assert_eq!(events.last(), Some(&FilterEvent::Completed(Vec::new())));
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn test_chunk_error_fails_job_without_partial_result() {
        let worker = BackgroundFilter::new(10, 10);
        let job = worker.start(synthetic(100), Arc::new(FailOnChunk(3, AtomicU64::new(0))));
        let err = job.wait().unwrap_err();
        assert!(matches!(err, PennyError::Worker(ref m) if m.contains("bad chunk")), "got {err}");
    }

    #[test]
    fn test_panicking_filter_fails_job() {
        let worker = BackgroundFilter::new(10, 10);
        let mut job = worker.start(synthetic(20), Arc::new(Panics));
        let last = job.by_ref().last();
        assert!(matches!(last, Some(FilterEvent::Failed(_))));
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn test_new_job_supersedes_running_one() {
        let worker = BackgroundFilter::new(10, 10);
        let first = worker.start(synthetic(2000), Arc::new(Slow));
        let second = worker.start(synthetic(30), Arc::new(Slow));
        assert!(second.generation() > first.generation());

        assert!(matches!(first.wait(), Err(PennyError::Superseded)));
        assert_eq!(second.wait().unwrap().len(), 30);
    }

    #[test]
    fn test_finished_job_is_still_superseded_by_a_newer_start() {
        let worker = BackgroundFilter::new(10, 10);
        let plan: Arc<dyn ChunkFilter> = Arc::new(FilterPlan::new(&FilterCriteria::new(), today()));
        let first = worker.start(synthetic(5), plan.clone());
        std::thread::sleep(Duration::from_millis(50));
        let second = worker.start(synthetic(5), plan);
        assert!(matches!(first.wait(), Err(PennyError::Superseded)));
        assert_eq!(second.wait().unwrap().len(), 5);
    }
}
