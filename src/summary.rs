use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::{TransactionRecord, TransactionType};
use crate::synthetic::SyntheticDataPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total_income: f64,
    pub income_count: usize,
    pub total_expense: f64,
    pub expense_count: usize,
    pub total_transactions: usize,
    pub total_amount: f64,
    pub average_amount: f64,
    pub categories_count: usize,
    pub this_month_amount: f64,
    pub this_week_amount: f64,
    pub category_breakdown: BTreeMap<String, f64>,
}

/// Statistics over real (non-synthetic) records. Everything is zero when
/// nothing real is left.
pub fn summarize(records: &[TransactionRecord], policy: &SyntheticDataPolicy, today: NaiveDate) -> ExpenseSummary {
    if !policy.has_real_data(records) {
        return ExpenseSummary::default();
    }
    let real = policy.filter(records);

    let mut s = ExpenseSummary::default();
    let month_start = today.with_day(1).unwrap_or(today);
    let week_start = today - Duration::days(7);
    let mut categories = BTreeSet::new();

    for r in &real {
        match r.transaction_type {
            TransactionType::Income | TransactionType::Credit => {
                s.total_income += r.amount;
                s.income_count += 1;
            }
            TransactionType::Expense | TransactionType::Debit => {
                s.total_expense += r.amount;
                s.expense_count += 1;
            }
        }
        s.total_amount += r.amount;
        if r.date >= month_start {
            s.this_month_amount += r.amount;
        }
        if r.date >= week_start {
            s.this_week_amount += r.amount;
        }
        categories.insert(r.category.as_str());
        *s.category_breakdown.entry(r.category.clone()).or_insert(0.0) += r.amount;
    }

    s.total_transactions = real.len();
    s.average_amount = s.total_amount / real.len() as f64;
    s.categories_count = categories.len();
    s
}
