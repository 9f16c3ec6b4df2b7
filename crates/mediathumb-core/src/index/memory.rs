//! In-memory media index.

use image::DynamicImage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::{ensure_not_cancelled, MediaIndex, ThumbnailSize};
use crate::error::IndexError;

/// How often a delayed lookup re-checks its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(2);

enum Entry {
    Image(DynamicImage),
    Failure(IndexError),
}

/// A media index backed by a map from uri to image.
///
/// Unknown uris report [`IndexError::NotFound`]. Failures can be registered
/// per uri, and an artificial latency makes cancellation observable.
#[derive(Default)]
pub struct StaticMediaIndex {
    entries: RwLock<HashMap<String, Entry>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticMediaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block every lookup for `latency`, or until cancelled.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `image` for `uri`. Images are returned as stored, not rescaled.
    pub fn insert(&self, uri: impl Into<String>, image: DynamicImage) {
        self.entries.write().insert(uri.into(), Entry::Image(image));
    }

    /// Fail every lookup of `uri` with `error`.
    pub fn insert_failure(&self, uri: impl Into<String>, error: IndexError) {
        self.entries.write().insert(uri.into(), Entry::Failure(error));
    }

    /// Forget `uri`, so it reports not found again.
    pub fn remove(&self, uri: &str) {
        self.entries.write().remove(uri);
    }

    /// Number of lookups served so far, cancelled ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn wait(&self, uri: &str, cancel: &CancellationToken) -> Result<(), IndexError> {
        let Some(latency) = self.latency else {
            return Ok(());
        };
        let deadline = Instant::now() + latency;
        while Instant::now() < deadline {
            ensure_not_cancelled(uri, cancel)?;
            std::thread::sleep(CANCEL_POLL_INTERVAL);
        }
        Ok(())
    }
}

impl MediaIndex for StaticMediaIndex {
    fn load_thumbnail(
        &self,
        uri: &str,
        _size: ThumbnailSize,
        cancel: &CancellationToken,
    ) -> Result<DynamicImage, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure_not_cancelled(uri, cancel)?;
        self.wait(uri, cancel)?;

        match self.entries.read().get(uri) {
            Some(Entry::Image(image)) => Ok(image.clone()),
            Some(Entry::Failure(error)) => Err(error.clone()),
            None => Err(IndexError::NotFound {
                uri: uri.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_uri_is_not_found() {
        let index = StaticMediaIndex::new();
        let err = index
            .load_thumbnail(
                "content://media/1",
                ThumbnailSize::new(8, 8),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(index.calls(), 1);
    }

    #[test]
    fn test_registered_failure_is_returned() {
        let index = StaticMediaIndex::new();
        index.insert_failure(
            "content://media/1",
            IndexError::PermissionDenied {
                uri: "content://media/1".to_string(),
            },
        );
        let err = index
            .load_thumbnail(
                "content://media/1",
                ThumbnailSize::new(8, 8),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::PermissionDenied { .. }));
    }

    #[test]
    fn test_latency_is_cut_short_by_cancel() {
        let index = StaticMediaIndex::new().with_latency(Duration::from_secs(30));
        index.insert("content://media/1", DynamicImage::new_rgb8(4, 4));
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                token.cancel();
            })
        };

        let start = Instant::now();
        let err = index
            .load_thumbnail("content://media/1", ThumbnailSize::new(4, 4), &token)
            .unwrap_err();
        canceller.join().unwrap();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
