//! CLI configuration management

use anyhow::{Context, Result};
use caper_common::constants::HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caper-history")
    }

    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".caper-history")
    }
}

/// Get the config file path
pub fn config_file() -> PathBuf {
    config_dir().join("config.yml")
}

/// Default key/value store file
pub fn store_file() -> PathBuf {
    config_dir().join("store.json")
}

/// Ensure the config directory exists
pub fn ensure_dirs() -> Result<()> {
    fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    Ok(())
}

/// Main configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Page location relative request URLs resolve against
    #[serde(default = "default_page_url")]
    pub page_url: String,

    /// Number of submissions kept
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Override for the key/value store file
    #[serde(default)]
    pub store_file: Option<PathBuf>,
}

fn default_page_url() -> String {
    "https://caper.sks.go.th/".to_string()
}

fn default_history_limit() -> usize {
    HISTORY_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            history_limit: default_history_limit(),
            store_file: None,
        }
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Parsed page location
    pub fn page_url(&self) -> Result<Url> {
        Url::parse(&self.page_url)
            .with_context(|| format!("Invalid page_url in config: {}", self.page_url))
    }

    /// Capacity, never below one entry
    pub fn history_limit(&self) -> usize {
        self.history_limit.max(1)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_file.clone().unwrap_or_else(store_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config.history_limit(), 50);
        assert_eq!(config.page_url().unwrap().as_str(), "https://caper.sks.go.th/");
        assert_eq!(config.store_path(), store_file());
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "history_limit: 0\nstore_file: /tmp/caper.json\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.history_limit(), 1);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/caper.json"));
        assert_eq!(config.page_url, default_page_url());
    }

    #[test]
    fn test_invalid_page_url() {
        let config = Config {
            page_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.page_url().is_err());
    }
}
