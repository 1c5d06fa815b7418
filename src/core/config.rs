use crate::persist::persister::{PersistOptions, STORAGE_KEY, STORAGE_VERSION};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per storage key
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_storage_key")]
    pub key: String,
    #[serde(default = "default_storage_version")]
    pub version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `console` for human-readable lines, `json` for one object per event
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Whether events are emitted as JSON objects rather than console lines
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            key: default_storage_key(),
            version: default_storage_version(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_storage_dir() -> PathBuf {
    PathBuf::from(".pointstore")
}

fn default_storage_key() -> String {
    STORAGE_KEY.to_string()
}

fn default_storage_version() -> u32 {
    STORAGE_VERSION
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.storage.key.is_empty() {
            bail!("storage key must not be empty");
        }

        if self
            .storage
            .key
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            bail!(
                "storage key '{}' must not contain path separators or control characters",
                self.storage.key
            );
        }

        if self.storage.version == 0 {
            bail!("storage version must be greater than 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }

    pub fn persist_options(&self) -> PersistOptions {
        PersistOptions {
            name: self.storage.key.clone(),
            version: self.storage.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.storage.dir, PathBuf::from(".pointstore"));
        assert_eq!(config.storage.key, "auth-storage");
        assert_eq!(config.storage.version, 1);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "console");
        assert!(!config.logging.is_json());
        assert_eq!(config.persist_options(), PersistOptions::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[storage]
dir = "/var/lib/pointstore"
key = "points"
version = 2

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).expect("Failed to load config");

        assert_eq!(config.storage.dir, PathBuf::from("/var/lib/pointstore"));
        let options = config.persist_options();
        assert_eq!(options.name, "points");
        assert_eq!(options.version, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::from_file(&temp_dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::from_toml("[storage]\nkey = \"\"").is_err());
        assert!(Config::from_toml("[storage]\nkey = \"../escape\"").is_err());
        assert!(Config::from_toml("[storage]\nversion = 0").is_err());
        assert!(Config::from_toml("[logging]\nlevel = \"loud\"").is_err());
        assert!(Config::from_toml("[logging]\nformat = \"xml\"").is_err());
    }
}
