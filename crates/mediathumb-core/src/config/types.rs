//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory-backed media index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the media files `content://media/<id>` resolves into
    pub root_dir: PathBuf,

    /// File extensions tried for each id, in order
    pub extensions: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("~/.mediathumb/media"),
            extensions: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
            ],
        }
    }
}

/// Fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound for a single fetch+decode in milliseconds
    pub timeout_ms: u64,

    /// Width requested when the caller does not pick one
    pub default_width: u32,

    /// Height requested when the caller does not pick one
    pub default_height: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            default_width: 128,
            default_height: 128,
        }
    }
}

/// Bitmap pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum bytes of recycled pixel buffers kept around, in megabytes
    pub max_size_mb: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_size_mb: 16 }
    }
}

impl PoolConfig {
    /// Pool budget in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

/// Memory cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum bytes of decoded thumbnails kept in memory, in megabytes
    pub max_size_mb: u64,

    /// How many "no thumbnail" results are remembered
    pub max_failed_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 32,
            max_failed_entries: 1024,
        }
    }
}

impl CacheConfig {
    /// Cache budget in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,

    /// Number of recent log lines attached to crash reports
    pub breadcrumbs: usize,

    /// JSON lines file crash reports are appended to (disabled when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_report_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            breadcrumbs: 200,
            crash_report_path: None,
        }
    }
}
