use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use penny::error::Result;
use penny::models::{RecordDraft, TransactionType};

use super::load_engine;

/// Days of history the generated records are spread over.
const DEMO_SPAN_DAYS: i64 = 365;

struct Spend {
    category: &'static str,
    sub_category: &'static str,
    notes: &'static [&'static str],
    low: f64,
    high: f64,
}

const SPENDS: &[Spend] = &[
    Spend { category: "Food", sub_category: "Groceries", notes: &["Weekly vegetables", "Big Basket order", "Milk and bread"], low: 120.0, high: 2400.0 },
    Spend { category: "Food", sub_category: "Dining Out", notes: &["Dinner with friends", "Office lunch", "Coffee"], low: 90.0, high: 1800.0 },
    Spend { category: "Transport", sub_category: "Fuel", notes: &["Petrol top-up", "Full tank"], low: 500.0, high: 3500.0 },
    Spend { category: "Transport", sub_category: "Cab", notes: &["Airport ride", "Late night cab", "Metro card recharge"], low: 80.0, high: 1200.0 },
    Spend { category: "Housing", sub_category: "Rent", notes: &["Monthly rent"], low: 18000.0, high: 22000.0 },
    Spend { category: "Housing", sub_category: "Electricity", notes: &["Power bill", "Electricity board"], low: 600.0, high: 3200.0 },
    Spend { category: "Shopping", sub_category: "Clothes", notes: &["Winter jacket", "Shoes", "Festival shopping"], low: 400.0, high: 6000.0 },
    Spend { category: "Health", sub_category: "Pharmacy", notes: &["Medicines", "Vitamins"], low: 60.0, high: 1500.0 },
    Spend { category: "Entertainment", sub_category: "Streaming", notes: &["Music plan", "Video plan"], low: 129.0, high: 649.0 },
];

const MODES: &[&str] = &["Cash", "Card", "UPI", "Net Banking"];

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn generate(count: usize, today: NaiveDate, rng: &mut impl Rng) -> Vec<RecordDraft> {
    (0..count)
        .map(|i| {
            let date = today - Duration::days(rng.gen_range(0..DEMO_SPAN_DAYS));
            // Roughly one in twelve records is money coming in.
            if i % 12 == 0 {
                let (kind, sub, note) = if rng.gen_bool(0.7) {
                    (TransactionType::Income, "Salary", "Monthly salary")
                } else {
                    (TransactionType::Credit, "Refund", "Order refund")
                };
                return RecordDraft {
                    date,
                    transaction_type: kind,
                    category: "Income".to_string(),
                    sub_category: sub.to_string(),
                    transaction_mode: "Net Banking".to_string(),
                    amount: round2(rng.gen_range(500.0..90000.0)),
                    notes: note.to_string(),
                };
            }
            let spend = &SPENDS[rng.gen_range(0..SPENDS.len())];
            RecordDraft {
                date,
                transaction_type: if rng.gen_bool(0.8) { TransactionType::Expense } else { TransactionType::Debit },
                category: spend.category.to_string(),
                sub_category: spend.sub_category.to_string(),
                transaction_mode: MODES.choose(rng).copied().unwrap_or("Cash").to_string(),
                amount: round2(rng.gen_range(spend.low..spend.high)),
                notes: spend.notes.choose(rng).copied().unwrap_or("").to_string(),
            }
        })
        .collect()
}

pub fn run(count: usize) -> Result<()> {
    let (_, engine) = load_engine();
    let mut rng = rand::thread_rng();
    let drafts = generate(count, engine.today(), &mut rng);
    let added = engine.add_records(&drafts)?;
    println!("Added {added} demo records. Try `penny list --date this_month` or `penny summary`.");
    Ok(())
}
