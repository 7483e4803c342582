use chrono::NaiveDate;

use penny::error::{PennyError, Result};
use penny::fmt::money;
use penny::models::{RecordDraft, TransactionType, DATE_FORMAT};

use super::{load_engine, RecordArgs, UpdateArgs};

pub(crate) fn parse_cli_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| PennyError::Other(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

fn parse_kind(raw: &str) -> Result<TransactionType> {
    raw.parse::<TransactionType>().map_err(PennyError::Other)
}

pub fn add(args: RecordArgs) -> Result<()> {
    let (settings, engine) = load_engine();
    let date = match args.date.as_deref() {
        Some(d) => parse_cli_date(d)?,
        None => engine.today(),
    };
    let draft = RecordDraft {
        date,
        transaction_type: parse_kind(&args.kind)?,
        category: args.category.trim().to_string(),
        sub_category: args.sub_category.trim().to_string(),
        transaction_mode: args.mode.trim().to_string(),
        amount: args.amount,
        notes: args.notes.trim().to_string(),
    };
    let id = engine.add_record(&draft)?;
    println!(
        "Added record {id}: {} {} / {} {}",
        draft.transaction_type,
        draft.category,
        draft.sub_category,
        money(draft.amount, &settings.currency_symbol)
    );
    Ok(())
}

pub fn update(id: i64, fields: UpdateArgs) -> Result<()> {
    let (_, engine) = load_engine();
    let current = engine.get_by_id(id).ok_or(PennyError::UnknownRecord(id))?;

    let mut draft = RecordDraft {
        date: current.date,
        transaction_type: current.transaction_type,
        category: current.category,
        sub_category: current.sub_category,
        transaction_mode: current.transaction_mode,
        amount: current.amount,
        notes: current.notes,
    };
    if let Some(d) = fields.date.as_deref() {
        draft.date = parse_cli_date(d)?;
    }
    if let Some(k) = fields.kind.as_deref() {
        draft.transaction_type = parse_kind(k)?;
    }
    if let Some(c) = fields.category {
        draft.category = c.trim().to_string();
    }
    if let Some(s) = fields.sub_category {
        draft.sub_category = s.trim().to_string();
    }
    if let Some(m) = fields.mode {
        draft.transaction_mode = m.trim().to_string();
    }
    if let Some(a) = fields.amount {
        draft.amount = a;
    }
    if let Some(n) = fields.notes {
        draft.notes = n.trim().to_string();
    }

    engine.update_record(id, &draft)?;
    println!("Updated record {id}.");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let (_, engine) = load_engine();
    engine.delete_record(id)?;
    println!("Deleted record {id}.");
    Ok(())
}
