use std::path::PathBuf;

use penny::error::Result;
use penny::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};
use penny::store::CsvStore;

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() {
        // First run: ask where the ledger should live.
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok();
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    let store = CsvStore::in_dir(&resolved);
    store.init()?;

    println!("Initialized penny at {}", resolved.display());
    Ok(())
}
