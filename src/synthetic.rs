//! Heuristic removal of demo/seed rows before statistics are computed.
//!
//! This is a tunable policy, not a correctness rule: it can misclassify
//! genuine low-variance data (a ledger of identical subscription charges
//! looks exactly like seed data). Only summary consumers apply it; the
//! filter path never does.

use regex::{Regex, RegexBuilder};

use crate::models::TransactionRecord;

const DEFAULT_NOTE_MARKERS: &[&str] = &[
    "Sample expense",
    "Sample income",
    "Test expense",
    "Test income",
    "Sample transaction",
    "Test transaction",
];

const DEFAULT_SUB_CATEGORY_PATTERNS: &[&str] = &[r"^.*_sub_\d+$", r"^General$", r"^Test", r"^Sample"];

#[derive(Debug, Clone)]
pub struct SyntheticDataPolicy {
    /// Case-insensitive substrings of `notes` that mark a sample row.
    pub note_markers: Vec<String>,
    /// Case-insensitive patterns matched against `sub_category`.
    pub sub_category_patterns: Vec<Regex>,
    /// Residual sets smaller than `max(min_residual, residual_fraction * n)`
    /// are checked for uniformity.
    pub min_residual: usize,
    pub residual_fraction: f64,
    /// Variance-to-mean ratio under which a small residual set is treated
    /// as synthetic too.
    pub uniformity_threshold: f64,
}

impl Default for SyntheticDataPolicy {
    fn default() -> Self {
        Self {
            note_markers: DEFAULT_NOTE_MARKERS.iter().map(|m| m.to_lowercase()).collect(),
            sub_category_patterns: DEFAULT_SUB_CATEGORY_PATTERNS
                .iter()
                .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
                .collect(),
            min_residual: 10,
            residual_fraction: 0.1,
            uniformity_threshold: 0.1,
        }
    }
}

impl SyntheticDataPolicy {
    pub fn is_marked(&self, record: &TransactionRecord) -> bool {
        let notes = record.notes.to_lowercase();
        if self.note_markers.iter().any(|m| notes.contains(m.as_str())) {
            return true;
        }
        self.sub_category_patterns
            .iter()
            .any(|re| re.is_match(&record.sub_category))
    }

    /// Drop marked rows; if the residual set is small and suspiciously
    /// uniform in amount, drop it as well.
    pub fn filter(&self, records: &[TransactionRecord]) -> Vec<TransactionRecord> {
        let residual: Vec<TransactionRecord> = records
            .iter()
            .filter(|r| !self.is_marked(r))
            .cloned()
            .collect();

        let floor = (self.min_residual as f64).max(records.len() as f64 * self.residual_fraction);
        if !residual.is_empty() && (residual.len() as f64) < floor {
            let amounts: Vec<f64> = residual.iter().map(|r| r.amount).collect();
            if let Some(ratio) = variance_to_mean(&amounts) {
                if ratio < self.uniformity_threshold {
                    tracing::debug!(
                        residual = residual.len(),
                        ratio,
                        "residual rows look uniform; treating all as synthetic"
                    );
                    return Vec::new();
                }
            }
        }
        residual
    }

    /// True when something survives `filter` and it carries at least one
    /// positive amount and one non-blank category.
    pub fn has_real_data(&self, records: &[TransactionRecord]) -> bool {
        let real = self.filter(records);
        !real.is_empty()
            && real.iter().any(|r| r.amount > 0.0)
            && real.iter().any(|r| !r.category.trim().is_empty())
    }
}

/// Sample variance over mean. `None` when undefined (fewer than two values
/// or a non-positive mean).
fn variance_to_mean(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var / mean)
}
