use std::path::PathBuf;

use penny::error::Result;
use penny::importer::ImportLog;
use penny::settings::settings_path;
use penny::store::LEDGER_FILE;

use super::load_engine;

pub fn run() -> Result<()> {
    let (settings, engine) = load_engine();
    let data_dir = PathBuf::from(&settings.data_dir);
    let ledger = data_dir.join(LEDGER_FILE);

    println!("Settings:   {}", settings_path().display());
    println!("Data dir:   {}", data_dir.display());
    println!("Ledger:     {}", ledger.display());

    if !ledger.exists() {
        println!();
        println!("Ledger not found. Run `penny init` to set up.");
        return Ok(());
    }

    let records = engine.get_all();
    let imports = ImportLog::in_dir(&data_dir).entries()?;
    let categories = engine.category_pairs();

    println!();
    println!("Records:       {}", records.len());
    println!("Category pairs: {}", categories.len());
    println!("Imports:       {}", imports.len());
    println!();
    println!("Cache TTL:     {}s", settings.cache_ttl_secs);
    println!("Background at: > {} records", settings.background_threshold);
    println!("Chunk size:    {}..{}", settings.base_chunk_size, settings.max_chunk_size);
    println!("Result limit:  {} (+{} per --more)", settings.result_limit, settings.load_more_step);
    Ok(())
}
