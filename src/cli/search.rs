use penny::error::Result;

use super::{load_engine, records_table};

pub fn run(term: &str) -> Result<()> {
    let (settings, engine) = load_engine();
    let found = engine.search(term);
    if found.is_empty() {
        println!("No records contain '{}'.", term.trim());
        return Ok(());
    }
    let table = records_table(&found, &settings.currency_symbol);
    println!("Search: {}\n{table}", term.trim());
    println!("{} found", found.len());
    Ok(())
}
