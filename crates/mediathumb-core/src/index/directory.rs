//! Directory-backed media index.

use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::{ensure_not_cancelled, media_id, MediaIndex, ThumbnailSize};
use crate::config::Config;
use crate::error::IndexError;

/// Serves `content://media/<id>` from `<root>/<id>.<ext>`.
///
/// Extensions are tried in configured order. The file is decoded with the
/// `image` crate and scaled to fit the requested bounds, keeping its aspect
/// ratio.
pub struct DirectoryMediaIndex {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryMediaIndex {
    /// Create an index over `root`, probing the given extensions.
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    /// Create an index from the `[index]` config section.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.index_root(), config.index.extensions.clone())
    }

    /// The directory this index serves from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the file backing `uri`.
    pub fn resolve(&self, uri: &str) -> Result<PathBuf, IndexError> {
        let id = media_id(uri)?;

        for ext in &self.extensions {
            let candidate = self.root.join(format!("{id}.{ext}"));
            match std::fs::metadata(&candidate) {
                Ok(metadata) if metadata.is_file() => return Ok(candidate),
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(IndexError::from_io(uri, &e)),
            }
        }

        Err(IndexError::NotFound {
            uri: uri.to_string(),
        })
    }

    fn decode(uri: &str, bytes: Vec<u8>) -> Result<DynamicImage, IndexError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| IndexError::Extract {
                uri: uri.to_string(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        reader.decode().map_err(|e| IndexError::Extract {
            uri: uri.to_string(),
            message: e.to_string(),
        })
    }
}

impl MediaIndex for DirectoryMediaIndex {
    fn load_thumbnail(
        &self,
        uri: &str,
        size: ThumbnailSize,
        cancel: &CancellationToken,
    ) -> Result<DynamicImage, IndexError> {
        ensure_not_cancelled(uri, cancel)?;
        let path = self.resolve(uri)?;
        tracing::trace!("Resolved {} to {:?}", uri, path);

        let bytes = std::fs::read(&path).map_err(|e| IndexError::from_io(uri, &e))?;
        ensure_not_cancelled(uri, cancel)?;

        let image = Self::decode(uri, bytes)?;
        ensure_not_cancelled(uri, cancel)?;

        Ok(image.thumbnail(size.width, size.height))
    }
}
