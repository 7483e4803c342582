use std::collections::BTreeSet;

use chrono::{Datelike, Days, Duration, NaiveDate};
use serde_json::Value;

use crate::models::{TransactionRecord, TransactionType, DATE_FORMAT};

/// Values dropped from category and sub-category selections before use.
const BLANK_SELECTIONS: &[&str] = &["", "nan"];

const DEFAULT_LAST_N_DAYS: u32 = 30;

// ---------------------------------------------------------------------------
// Date filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Today,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
}

impl DatePreset {
    pub const ALL: [DatePreset; 6] = [
        Self::Today,
        Self::ThisWeek,
        Self::LastWeek,
        Self::ThisMonth,
        Self::LastMonth,
        Self::ThisYear,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::ThisWeek => "this_week",
            Self::LastWeek => "last_week",
            Self::ThisMonth => "this_month",
            Self::LastMonth => "last_month",
            Self::ThisYear => "this_year",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Concrete inclusive window for this preset. Weeks run Monday to Sunday.
    pub fn window(&self, today: NaiveDate) -> DateWindow {
        let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let month_start = today.with_day(1).unwrap_or(today);
        match self {
            Self::Today => DateWindow::new(today, today),
            Self::ThisWeek => DateWindow::new(week_start, week_start + Duration::days(6)),
            Self::LastWeek => {
                let start = week_start - Duration::days(7);
                DateWindow::new(start, start + Duration::days(6))
            }
            Self::ThisMonth => DateWindow::new(month_start, last_day_of_month(month_start)),
            Self::LastMonth => {
                let end = month_start - Duration::days(1);
                DateWindow::new(end.with_day(1).unwrap_or(end), end)
            }
            Self::ThisYear => {
                let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                let end = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
                DateWindow::new(start, end)
            }
        }
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (y, m) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .map(|next| next - Duration::days(1))
        .unwrap_or(first)
}

/// Inclusive on both ends. A window whose start is after its end is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilter {
    All,
    Preset(DatePreset),
    /// Constrains only when both bounds are given.
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// `today - n` through today.
    LastNDays(u32),
}

impl DateFilter {
    /// `None` means the filter places no constraint. Relative filters are
    /// resolved against `today` on every call.
    pub fn resolve(&self, today: NaiveDate) -> Option<DateWindow> {
        match self {
            Self::All => None,
            Self::Preset(p) => Some(p.window(today)),
            Self::Range {
                start: Some(start),
                end: Some(end),
            } => Some(DateWindow::new(*start, *end)),
            Self::Range { .. } => None,
            // A span reaching past the calendar's start covers all history.
            Self::LastNDays(n) => {
                let start = today.checked_sub_days(Days::new(u64::from(*n))).unwrap_or(NaiveDate::MIN);
                Some(DateWindow::new(start, today))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Amount range
// ---------------------------------------------------------------------------

/// Inclusive bounds; a missing bound is open on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AmountRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AmountRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        // A NaN bound could never compare true; treat it as absent.
        Self {
            min: min.filter(|v| !v.is_nan()),
            max: max.filter(|v| !v.is_nan()),
        }
    }

    pub fn contains(&self, amount: f64) -> bool {
        self.min.map_or(true, |min| amount >= min) && self.max.map_or(true, |max| amount <= max)
    }
}

// ---------------------------------------------------------------------------
// FilterCriteria
// ---------------------------------------------------------------------------

/// One filter request. Each field is a separate filter kind; `None` leaves
/// that kind unconstrained.
///
/// `transaction_types` and the category sets treat an empty set
/// differently: `Some(empty)` types match nothing, while an empty category
/// or sub-category set constrains nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterCriteria {
    pub date: Option<DateFilter>,
    pub transaction_types: Option<BTreeSet<TransactionType>>,
    pub amount_range: Option<AmountRange>,
    pub categories: Option<BTreeSet<String>>,
    pub sub_categories: Option<BTreeSet<String>>,
}

fn selection<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .filter(|v| !BLANK_SELECTIONS.contains(&v.as_str()))
        .collect()
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// No filter kind present at all.
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.transaction_types.is_none()
            && self.amount_range.is_none()
            && self.categories.is_none()
            && self.sub_categories.is_none()
    }

    pub fn with_date(mut self, date: DateFilter) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = TransactionType>) -> Self {
        self.transaction_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_amount_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.amount_range = Some(AmountRange::new(min, max));
        self
    }

    pub fn with_categories<S: Into<String>>(mut self, categories: impl IntoIterator<Item = S>) -> Self {
        self.categories = Some(selection(categories));
        self
    }

    pub fn with_sub_categories<S: Into<String>>(mut self, subs: impl IntoIterator<Item = S>) -> Self {
        self.sub_categories = Some(selection(subs));
        self
    }

    /// Build criteria from the loosely-typed map a UI produces. Never fails:
    /// a malformed value for a known key leaves that kind unconstrained, and
    /// unknown keys are ignored.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            tracing::debug!("filter payload is not an object; no constraints applied");
            return Self::default();
        };

        let mut criteria = Self::default();

        criteria.date = match obj.get("date_filter") {
            Some(Value::String(key)) => date_from_key(key, obj),
            Some(Value::Object(range)) => {
                let kind = range.get("type").and_then(Value::as_str).unwrap_or("range");
                (kind == "range").then(|| DateFilter::Range {
                    start: range.get("start_date").and_then(json_date),
                    end: range.get("end_date").and_then(json_date),
                })
            }
            _ => None,
        };

        if let Some(types) = obj.get("transaction_types") {
            match types.as_array() {
                // Present stays present, even when nothing in it is a known type.
                Some(items) => {
                    criteria.transaction_types = Some(
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .filter_map(TransactionType::from_label)
                            .collect(),
                    )
                }
                None => tracing::debug!("ignoring malformed transaction_types"),
            }
        }

        criteria.amount_range = obj.get("amount_range").and_then(|v| {
            let pair = v.as_array().filter(|a| a.len() == 2)?;
            let bound = |v: &Value| v.as_f64();
            Some(AmountRange::new(bound(&pair[0]), bound(&pair[1])))
        });

        criteria.categories = obj.get("categories").and_then(json_selection);
        criteria.sub_categories = obj.get("sub_categories").and_then(json_selection);
        criteria
    }
}

fn json_date(value: &Value) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.as_str()?.trim(), DATE_FORMAT).ok()
}

fn json_selection(value: &Value) -> Option<BTreeSet<String>> {
    let items = value.as_array()?;
    Some(selection(items.iter().filter_map(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })))
}

fn date_from_key(key: &str, obj: &serde_json::Map<String, Value>) -> Option<DateFilter> {
    if key == "all" {
        return Some(DateFilter::All);
    }
    if key == "custom_range" {
        return Some(DateFilter::Range {
            start: obj.get("start_date").and_then(json_date),
            end: obj.get("end_date").and_then(json_date),
        });
    }
    if let Some(preset) = DatePreset::from_key(key) {
        return Some(DateFilter::Preset(preset));
    }
    if let Some(middle) = key.strip_prefix("last_").and_then(|k| k.strip_suffix("_days")) {
        let n = obj
            .get("last_n_days")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| middle.parse().ok())
            .unwrap_or(DEFAULT_LAST_N_DAYS);
        return Some(DateFilter::LastNDays(n));
    }
    tracing::debug!(key, "unknown date filter; no date constraint applied");
    None
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Criteria resolved against one "today", ready to test records. The worker
/// resolves once per job so every chunk sees the same date window.
#[derive(Debug, Clone)]
pub struct FilterPlan {
    window: Option<DateWindow>,
    types: Option<BTreeSet<TransactionType>>,
    amount: Option<AmountRange>,
    categories: Option<BTreeSet<String>>,
    sub_categories: Option<BTreeSet<String>>,
    matches_nothing: bool,
}

impl FilterPlan {
    pub fn new(criteria: &FilterCriteria, today: NaiveDate) -> Self {
        let non_empty = |s: &Option<BTreeSet<String>>| s.clone().filter(|s| !s.is_empty());
        Self {
            window: criteria.date.as_ref().and_then(|d| d.resolve(today)),
            types: criteria.transaction_types.clone(),
            amount: criteria.amount_range,
            categories: non_empty(&criteria.categories),
            sub_categories: non_empty(&criteria.sub_categories),
            matches_nothing: criteria.transaction_types.as_ref().is_some_and(|t| t.is_empty()),
        }
    }

    /// True when a present-but-empty type set rules out every record.
    pub fn matches_nothing(&self) -> bool {
        self.matches_nothing
    }

    /// Predicates in fixed order: date, type, amount, category, sub-category.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if self.matches_nothing {
            return false;
        }
        if let Some(window) = &self.window {
            if !window.contains(record.date) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(&record.transaction_type) {
                return false;
            }
        }
        if let Some(amount) = &self.amount {
            if !amount.contains(record.amount) {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&record.category) {
                return false;
            }
        }
        if let Some(subs) = &self.sub_categories {
            if !subs.contains(&record.sub_category) {
                return false;
            }
        }
        true
    }

    /// Matching records, in snapshot order.
    pub fn run(&self, records: &[TransactionRecord]) -> Vec<TransactionRecord> {
        if records.is_empty() || self.matches_nothing {
            return Vec::new();
        }
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

pub fn apply(snapshot: &[TransactionRecord], criteria: &FilterCriteria, today: NaiveDate) -> Vec<TransactionRecord> {
    if snapshot.is_empty() {
        return Vec::new();
    }
    FilterPlan::new(criteria, today).run(snapshot)
}
