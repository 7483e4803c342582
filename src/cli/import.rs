use std::path::PathBuf;

use colored::Colorize;

use penny::error::Result;
use penny::importer::{import_statement, ImportLog};

use super::load_engine;

pub fn run(file: &str) -> Result<()> {
    let file_path = PathBuf::from(file);
    let (settings, engine) = load_engine();
    let log = ImportLog::in_dir(&PathBuf::from(&settings.data_dir));

    let result = import_statement(&engine, &log, &file_path)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!("{} imported, {} skipped (duplicates)", result.imported, result.skipped);
    if !result.errors.is_empty() {
        println!("{}", format!("{} rows could not be read:", result.errors.len()).yellow());
        for err in &result.errors {
            println!("  {err}");
        }
    }
    Ok(())
}
