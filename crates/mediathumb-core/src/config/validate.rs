//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.index.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "index.extensions must not be empty".into(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.timeout_ms must be > 0".into(),
            ));
        }
        if self.fetch.default_width == 0 || self.fetch.default_height == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.default_width and fetch.default_height must be > 0".into(),
            ));
        }
        if self.cache.max_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_size_mb must be > 0".into(),
            ));
        }
        if self.cache.max_failed_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_failed_entries must be > 0".into(),
            ));
        }
        if self.logging.breadcrumbs == 0 {
            return Err(ConfigError::ValidationError(
                "logging.breadcrumbs must be > 0".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }
}
