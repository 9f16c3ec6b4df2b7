//! Media index backends.
//!
//! A media index resolves a content uri to a pre-rendered thumbnail. The call
//! blocks the current thread and honors a cancellation token at whatever
//! granularity the backend supports.
//!
//! - **directory**: resolves `content://media/<id>` into files on disk
//! - **memory**: an in-memory index for embedders and tests

pub mod directory;
pub mod memory;

pub use directory::DirectoryMediaIndex;
pub use memory::StaticMediaIndex;

use image::DynamicImage;
use tokio_util::sync::CancellationToken;

use crate::error::IndexError;

/// Scheme prefix for media index content uris.
pub const CONTENT_URI_PREFIX: &str = "content://media/";

/// Requested thumbnail bounds in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A source of pre-rendered thumbnails.
///
/// Implementations must return [`IndexError::NotFound`] when the uri does not
/// resolve to any content, and a different variant for every other failure.
pub trait MediaIndex: Send + Sync {
    /// Retrieve a thumbnail for `uri` that fits within `size`.
    ///
    /// Blocks until the thumbnail is available, the retrieval fails, or
    /// `cancel` is triggered.
    fn load_thumbnail(
        &self,
        uri: &str,
        size: ThumbnailSize,
        cancel: &CancellationToken,
    ) -> Result<DynamicImage, IndexError>;
}

/// Extract the media id from a `content://media/<id>` uri.
///
/// Ids are restricted to ASCII alphanumerics, `-` and `_` so they can be
/// mapped onto file names safely.
pub fn media_id(uri: &str) -> Result<&str, IndexError> {
    let id = uri
        .strip_prefix(CONTENT_URI_PREFIX)
        .ok_or_else(|| IndexError::InvalidUri {
            uri: uri.to_string(),
        })?;

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(IndexError::InvalidUri {
            uri: uri.to_string(),
        });
    }
    Ok(id)
}

/// Fail with [`IndexError::Cancelled`] if `cancel` has been triggered.
pub(crate) fn ensure_not_cancelled(uri: &str, cancel: &CancellationToken) -> Result<(), IndexError> {
    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled {
            uri: uri.to_string(),
        });
    }
    Ok(())
}
