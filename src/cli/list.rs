use std::io::Write;

use colored::Colorize;

use penny::error::{PennyError, Result};
use penny::filter::{DateFilter, DatePreset, FilterCriteria};
use penny::fmt::money;
use penny::limiter::ResultWindow;
use penny::models::TransactionType;

use super::records::parse_cli_date;
use super::{load_engine, records_table, ListArgs};

pub(crate) fn criteria_from_args(args: &ListArgs) -> Result<FilterCriteria> {
    let mut criteria = FilterCriteria::new();

    if let Some(key) = args.date.as_deref() {
        let preset = DatePreset::from_key(key).ok_or_else(|| {
            let known: Vec<&str> = DatePreset::ALL.iter().map(|p| p.key()).collect();
            PennyError::Other(format!("Unknown date preset '{key}' (expected one of: {})", known.join(", ")))
        })?;
        criteria = criteria.with_date(DateFilter::Preset(preset));
    } else if let Some(n) = args.last_days {
        criteria = criteria.with_date(DateFilter::LastNDays(n));
    } else if args.from.is_some() || args.to.is_some() {
        let start = args.from.as_deref().map(parse_cli_date).transpose()?;
        let end = args.to.as_deref().map(parse_cli_date).transpose()?;
        criteria = criteria.with_date(DateFilter::Range { start, end });
    }

    if args.no_types {
        criteria = criteria.with_types([]);
    } else if !args.types.is_empty() {
        let types = args
            .types
            .iter()
            .map(|t| t.parse::<TransactionType>().map_err(PennyError::Other))
            .collect::<Result<Vec<_>>>()?;
        criteria = criteria.with_types(types);
    }

    if args.min.is_some() || args.max.is_some() {
        criteria = criteria.with_amount_range(args.min, args.max);
    }
    if !args.category.is_empty() {
        criteria = criteria.with_categories(args.category.iter().cloned());
    }
    if !args.sub_category.is_empty() {
        criteria = criteria.with_sub_categories(args.sub_category.iter().cloned());
    }
    Ok(criteria)
}

pub fn run(args: ListArgs) -> Result<()> {
    let (settings, engine) = load_engine();
    let criteria = criteria_from_args(&args)?;

    let mut window = ResultWindow::new(args.limit.unwrap_or(settings.result_limit), settings.load_more_step);
    for _ in 0..args.more {
        window.load_more();
    }

    let show_progress = args.progress;
    let outcome = engine.filter_with_progress(&criteria, |p| {
        if show_progress {
            eprint!("\rFiltering... {p:>3}%");
            std::io::stderr().flush().ok();
        }
    });
    if show_progress {
        eprintln!();
    }

    let records = match outcome {
        Ok(records) => records,
        Err(e @ (PennyError::Worker(_) | PennyError::Superseded)) => {
            eprintln!("{} {e}", "Warning:".yellow().bold());
            eprintln!("Showing no results. Run the same command again to retry.");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let total: f64 = records.iter().map(|r| r.amount).sum();
    let limited = window.apply(records);
    if limited.visible.is_empty() {
        println!("No records match.");
        return Ok(());
    }

    let table = records_table(&limited.visible, &settings.currency_symbol);
    println!("Records\n{table}");
    println!(
        "{} records, {} total",
        limited.total_count,
        money(total, &settings.currency_symbol).bold()
    );
    if limited.truncated {
        println!(
            "Showing the first {} of {}. Pass --more to see {} more.",
            limited.visible.len(),
            limited.total_count,
            window.step
        );
    }
    Ok(())
}
