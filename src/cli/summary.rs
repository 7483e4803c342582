use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use penny::error::Result;
use penny::fmt::money;

use super::load_engine;

pub fn run() -> Result<()> {
    let (settings, engine) = load_engine();
    let s = engine.summary();
    let sym = settings.currency_symbol.as_str();

    if s.total_transactions == 0 {
        println!("No real records yet. Add some with `penny add` or `penny import`.");
        return Ok(());
    }

    println!("{}", "INCOME".green().bold());
    println!("  {} across {} records", money(s.total_income, sym).green(), s.income_count);
    println!("{}", "EXPENSES".red().bold());
    println!("  {} across {} records", money(s.total_expense, sym).red(), s.expense_count);
    println!();
    println!("Transactions:  {}", s.total_transactions);
    println!("Total amount:  {}", money(s.total_amount, sym));
    println!("Average:       {}", money(s.average_amount, sym));
    println!("This month:    {}", money(s.this_month_amount, sym));
    println!("Last 7 days:   {}", money(s.this_week_amount, sym));
    println!("Categories:    {}", s.categories_count);

    let mut breakdown: Vec<(&String, &f64)> = s.category_breakdown.iter().collect();
    breakdown.sort_by(|a, b| b.1.total_cmp(a.1));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Category", "Amount", "Share"]);
    for (category, amount) in breakdown {
        let share = if s.total_amount > 0.0 { amount / s.total_amount * 100.0 } else { 0.0 };
        table.add_row(vec![category.clone(), money(*amount, sym), format!("{share:.1}%")]);
    }
    println!("\nBy category\n{table}");
    Ok(())
}
