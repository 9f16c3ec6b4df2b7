//! Error types for the mediathumb fetch-and-decode pipeline.
//!
//! Errors are organized by stage. Stage errors carry the content uri (or cache
//! key) and a message string instead of boxed sources, so a single failure can
//! be cloned out to every caller waiting on the same in-flight load.

use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for mediathumb operations outside a single load.
#[derive(Error, Debug)]
pub enum MediathumbError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Refused to overwrite an existing config file
    #[error("Config file already exists at: {}", path.display())]
    ConfigExists { path: PathBuf },

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures reported by a [`MediaIndex`](crate::index::MediaIndex).
///
/// `NotFound` is the only variant the fetcher recovers from locally; every
/// other variant reaches the pipeline driver unmodified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The identifier does not resolve to any content
    #[error("No media found for {uri}")]
    NotFound { uri: String },

    /// The index refused access to the content
    #[error("Permission denied for {uri}")]
    PermissionDenied { uri: String },

    /// The identifier could not be parsed
    #[error("Malformed content uri: {uri}")]
    InvalidUri { uri: String },

    /// The retrieval observed its cancellation token
    #[error("Retrieval of {uri} was cancelled")]
    Cancelled { uri: String },

    /// Reading the backing content failed
    #[error("IO error for {uri}: {message}")]
    Io { uri: String, message: String },

    /// The content exists but no thumbnail could be produced from it
    #[error("Thumbnail extraction failed for {uri}: {message}")]
    Extract { uri: String, message: String },
}

impl IndexError {
    /// Classify an I/O error raised while reading the content behind `uri`.
    pub fn from_io(uri: &str, err: &std::io::Error) -> Self {
        let uri = uri.to_string();
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound { uri },
            ErrorKind::PermissionDenied => Self::PermissionDenied { uri },
            _ => Self::Io {
                uri,
                message: err.to_string(),
            },
        }
    }

    /// Whether this failure means "no such content".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the retrieval stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Decoder failures.
///
/// A decoder wired to the wrong data source is a programming defect and always
/// fails; it never degrades to an empty result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder received a source kind it cannot unwrap
    #[error("{decoder} can only decode media index thumbnails, got a {found} source")]
    UnexpectedSource {
        decoder: &'static str,
        found: &'static str,
    },
}

/// Errors surfaced by the pipeline driver for a single load.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// The media index failed with something other than "not found"
    #[error("Fetch failed for {key}: {source}")]
    Fetch { key: String, source: IndexError },

    /// The decoder rejected the fetched data
    #[error("Decode failed for {key}: {source}")]
    Decode { key: String, source: DecodeError },

    /// The load did not finish in time
    #[error("Timeout loading {key} after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },

    /// The blocking worker panicked or was aborted
    #[error("Worker for {key} failed: {message}")]
    Worker { key: String, message: String },
}

/// Convenience type alias for mediathumb results.
pub type Result<T> = std::result::Result<T, MediathumbError>;

/// Convenience type alias for pipeline load results.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
