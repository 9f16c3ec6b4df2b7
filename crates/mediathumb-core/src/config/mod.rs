//! Configuration management for mediathumb.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::{ConfigError, MediathumbError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for mediathumb.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Media index settings
    pub index: IndexConfig,

    /// Fetch settings
    pub fetch: FetchConfig,

    /// Bitmap pool settings
    pub pool: PoolConfig,

    /// Memory cache settings
    pub cache: CacheConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.mediathumb.mediathumb/config.toml
    /// - Linux: ~/.config/mediathumb/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\mediathumb\config\config.toml
    ///
    /// Falls back to ~/.mediathumb/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "mediathumb", "mediathumb")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".mediathumb").join("config.toml")
            })
    }

    /// Get the resolved media root directory (with ~ expansion).
    pub fn index_root(&self) -> PathBuf {
        let path_str = self.index.root_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Get the resolved crash report path (with ~ expansion), if configured.
    pub fn crash_report_path(&self) -> Option<PathBuf> {
        self.logging
            .crash_report_path
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }

    /// Write the default configuration to `path`, creating parent
    /// directories. An existing file is only replaced when `force` is set.
    pub fn write_default(path: &Path, force: bool) -> crate::Result<()> {
        if path.exists() && !force {
            return Err(MediathumbError::ConfigExists {
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default().to_toml()?)?;
        Ok(())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.timeout_ms, 10_000);
        assert_eq!(config.logging.breadcrumbs, 200);
        assert_eq!(config.pool.max_size_mb, 16);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[index]"));
        assert!(toml.contains("[fetch]"));
        assert!(toml.contains("[logging]"));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch]\ntimeout_ms = 250\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fetch.timeout_ms, 250);
        assert_eq!(config.fetch.default_width, 128);
        assert_eq!(config.cache.max_size_mb, 32);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nbreadcrumbs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("breadcrumbs"));
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::write_default(&path, false).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fetch.default_width, 128);
        assert_eq!(config.cache.max_failed_entries, 1024);
    }

    #[test]
    fn test_write_default_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch]\ntimeout_ms = 5\n").unwrap();

        let err = Config::write_default(&path, false).unwrap_err();
        assert!(matches!(err, MediathumbError::ConfigExists { .. }));

        Config::write_default(&path, true).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fetch.timeout_ms, 10_000);
    }

    #[test]
    fn test_index_root_keeps_absolute_paths() {
        let mut config = Config::default();
        config.index.root_dir = PathBuf::from("/srv/media");
        assert_eq!(config.index_root(), PathBuf::from("/srv/media"));
    }
}
