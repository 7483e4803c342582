use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PennyError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_background_threshold")]
    pub background_threshold: usize,
    #[serde(default = "default_base_chunk_size")]
    pub base_chunk_size: usize,
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_load_more_step")]
    pub load_more_step: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_currency_symbol() -> String {
    "\u{20b9}".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_background_threshold() -> usize {
    500
}

fn default_base_chunk_size() -> usize {
    1000
}

fn default_max_chunk_size() -> usize {
    5000
}

fn default_result_limit() -> usize {
    5000
}

fn default_load_more_step() -> usize {
    2500
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            currency_symbol: default_currency_symbol(),
            cache_ttl_secs: default_cache_ttl_secs(),
            background_threshold: default_background_threshold(),
            base_chunk_size: default_base_chunk_size(),
            max_chunk_size: default_max_chunk_size(),
            result_limit: default_result_limit(),
            load_more_step: default_load_more_step(),
            log_level: default_log_level(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("penny")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("penny")
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %path.display(), "ignoring malformed settings file");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| PennyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            currency_symbol: "$".to_string(),
            result_limit: 100,
            ..Settings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.currency_symbol, "$");
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.result_limit, 100);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.currency_symbol, "\u{20b9}");
        assert_eq!(s.cache_ttl_secs, 30);
        assert_eq!(s.background_threshold, 500);
        assert_eq!(s.log_level, "warn");
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "cache_ttl_secs": 5}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.cache_ttl_secs, 5);
        assert_eq!(s.max_chunk_size, 5000);
        assert_eq!(s.load_more_step, 2500);
    }

    #[test]
    fn test_shellexpand_tilde() {
        let expanded = shellexpand_path("~/ledger");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("ledger"));
    }
}
