//! Cancellable thumbnail retrieval from a media index.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::source::{SourceData, ThumbnailCarrier};
use crate::error::IndexError;
use crate::index::{MediaIndex, ThumbnailSize};

/// Scheduling hint passed along with a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Immediate,
    High,
    #[default]
    Normal,
    Low,
}

/// Identity of a thumbnail request: `"{uri}[{width}, {height}]"`.
///
/// Two requests share a key iff the uri and both dimensions match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(uri: &str, width: u32, height: u32) -> Self {
        Self(format!("{uri}[{width}, {height}]"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single cancellable retrieval producing [`SourceData`] for a decoder.
pub trait DataFetcher: Send + Sync {
    /// Retrieve the data. Blocks the calling thread.
    fn load_data(&self, priority: Priority) -> Result<SourceData, IndexError>;

    /// Release operation-local resources. Safe to call more than once.
    fn cleanup(&self);

    /// Stable cache key of this retrieval.
    fn id(&self) -> &CacheKey;

    /// Ask the retrieval to stop as soon as possible. Idempotent.
    fn cancel(&self);
}

/// Fetches one pre-rendered thumbnail from a [`MediaIndex`].
///
/// "Not found" becomes an absent [`ThumbnailCarrier`]; every other index
/// failure is returned as-is. The cancellation token is forwarded into the
/// index call and is also triggered by cleanup of an unfinished fetch.
pub struct ThumbnailFetcher {
    index: Arc<dyn MediaIndex>,
    uri: String,
    size: ThumbnailSize,
    key: CacheKey,
    cancel_token: CancellationToken,
    completed: AtomicBool,
}

impl ThumbnailFetcher {
    pub fn new(index: Arc<dyn MediaIndex>, uri: impl Into<String>, width: u32, height: u32) -> Self {
        let uri = uri.into();
        let key = CacheKey::new(&uri, width, height);
        Self {
            index,
            uri,
            size: ThumbnailSize::new(width, height),
            key,
            cancel_token: CancellationToken::new(),
            completed: AtomicBool::new(false),
        }
    }

    /// Run the index lookup and wrap its result in a carrier.
    ///
    /// A fetch cancelled before or during the lookup returns an absent
    /// carrier; callers that observed the cancellation discard it.
    pub fn fetch(&self, priority: Priority) -> Result<ThumbnailCarrier, IndexError> {
        if self.cancel_token.is_cancelled() {
            tracing::debug!("Skipping fetch of {}: already cancelled", self.key);
            self.completed.store(true, Ordering::Release);
            return Ok(ThumbnailCarrier::absent());
        }

        tracing::debug!("Fetching {} ({:?} priority)", self.key, priority);
        let result = self
            .index
            .load_thumbnail(&self.uri, self.size, &self.cancel_token);
        self.completed.store(true, Ordering::Release);

        match result {
            Ok(image) => Ok(ThumbnailCarrier::new(image)),
            Err(e) if e.is_not_found() => {
                tracing::debug!("No thumbnail for {}", self.key);
                Ok(ThumbnailCarrier::absent())
            }
            Err(e) if e.is_cancelled() && self.cancel_token.is_cancelled() => {
                tracing::debug!("Fetch of {} cancelled mid-flight", self.key);
                Ok(ThumbnailCarrier::absent())
            }
            Err(e) => Err(e),
        }
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Whether the index call has returned (or was skipped).
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Cancels the retrieval if it never completed.
    pub fn cleanup(&self) {
        if !self.is_completed() {
            self.cancel_token.cancel();
        }
    }

    pub fn id(&self) -> &CacheKey {
        &self.key
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn size(&self) -> ThumbnailSize {
        self.size
    }
}

impl DataFetcher for ThumbnailFetcher {
    fn load_data(&self, priority: Priority) -> Result<SourceData, IndexError> {
        self.fetch(priority).map(SourceData::from)
    }

    fn cleanup(&self) {
        ThumbnailFetcher::cleanup(self);
    }

    fn id(&self) -> &CacheKey {
        ThumbnailFetcher::id(self)
    }

    fn cancel(&self) {
        ThumbnailFetcher::cancel(self);
    }
}

impl Drop for ThumbnailFetcher {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Builds [`ThumbnailFetcher`]s against one shared media index.
#[derive(Clone)]
pub struct ThumbnailSource {
    index: Arc<dyn MediaIndex>,
}

impl ThumbnailSource {
    pub fn new(index: Arc<dyn MediaIndex>) -> Self {
        Self { index }
    }

    /// Fetcher for `uri`, or `None` when there is no uri to fetch.
    pub fn fetcher(&self, uri: Option<&str>, width: u32, height: u32) -> Option<ThumbnailFetcher> {
        uri.map(|uri| self.fetcher_for(uri, width, height))
    }

    pub fn fetcher_for(&self, uri: &str, width: u32, height: u32) -> ThumbnailFetcher {
        ThumbnailFetcher::new(Arc::clone(&self.index), uri, width, height)
    }
}
