//! Pipeline driver: cache lookup, de-duplicated fetch, decode, cache insert.
//!
//! ```text
//! load(request) → memory cache hit? ─yes→ Loaded
//!                      │ no
//!                      ▼
//!       join in-flight load for the key, or start one:
//!       spawn_blocking { fetch → (cancelled? stop) → decode }
//!                      │
//!                      ▼
//!       Loaded → cache insert │ NoResult → failed-load record
//! ```

use futures_util::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::cache::{CacheStats, MemoryCache};
use super::decode::ResourceDecoder;
use super::fetch::{CacheKey, DataFetcher, Priority, ThumbnailFetcher, ThumbnailSource};
use crate::config::Config;
use crate::error::{LoadError, LoadResult};

/// A request for one thumbnail.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub priority: Priority,
    pub cancel: CancellationToken,
}

impl LoadRequest {
    pub fn new(uri: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            uri: uri.into(),
            width,
            height,
            priority: Priority::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Abort this request when `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.uri, self.width, self.height)
    }
}

/// How a load ended, when it did not fail.
pub enum LoadOutcome<R> {
    /// The thumbnail, shared with the memory cache
    Loaded(Arc<R>),
    /// The media index has no thumbnail for the key
    NoResult,
    /// The caller cancelled before the load finished
    Cancelled,
}

impl<R> LoadOutcome<R> {
    pub fn resource(&self) -> Option<&Arc<R>> {
        match self {
            Self::Loaded(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

impl<R> Clone for LoadOutcome<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Loaded(resource) => Self::Loaded(Arc::clone(resource)),
            Self::NoResult => Self::NoResult,
            Self::Cancelled => Self::Cancelled,
        }
    }
}

impl<R> fmt::Debug for LoadOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(_) => f.write_str("Loaded"),
            Self::NoResult => f.write_str("NoResult"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Memory bounds and deadline of a [`ThumbnailPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    /// Byte budget of the memory cache
    pub cache_bytes: u64,
    /// How many not-found keys are remembered
    pub failed_entries: usize,
    /// Deadline for a single load
    pub timeout: Duration,
}

impl PipelineLimits {
    /// Limits from the `[cache]` and `[fetch]` config sections.
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_bytes: config.cache.max_size_bytes(),
            failed_entries: config.cache.max_failed_entries,
            timeout: Duration::from_millis(config.fetch.timeout_ms),
        }
    }
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

type SharedLoad<R> = Shared<BoxFuture<'static, LoadResult<LoadOutcome<R>>>>;

struct InFlight<R> {
    generation: u64,
    load: SharedLoad<R>,
    fetcher: Arc<ThumbnailFetcher>,
    waiters: usize,
}

struct Inner<D: ResourceDecoder> {
    source: ThumbnailSource,
    decoder: D,
    cache: MemoryCache<D::Output>,
    // Most recent not-found keys, bounded.
    failed: Mutex<LruCache<CacheKey, ()>>,
    in_flight: Mutex<HashMap<CacheKey, InFlight<D::Output>>>,
    next_generation: AtomicU64,
    timeout: Duration,
}

/// Drives thumbnail loads through fetch, decode and the memory cache.
///
/// Concurrent requests for the same key share one fetch. A caller that
/// cancels or times out stops waiting; the fetch itself is cancelled once no
/// caller is left waiting for it.
pub struct ThumbnailPipeline<D: ResourceDecoder> {
    inner: Arc<Inner<D>>,
}

impl<D: ResourceDecoder> Clone for ThumbnailPipeline<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ResourceDecoder + 'static> ThumbnailPipeline<D> {
    /// Create a pipeline using the `[cache]` and `[fetch]` config sections.
    pub fn new(source: ThumbnailSource, decoder: D, config: &Config) -> Self {
        Self::with_limits(source, decoder, PipelineLimits::from_config(config))
    }

    pub fn with_limits(source: ThumbnailSource, decoder: D, limits: PipelineLimits) -> Self {
        let failed_entries = NonZeroUsize::new(limits.failed_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                source,
                decoder,
                cache: MemoryCache::new(limits.cache_bytes),
                failed: Mutex::new(LruCache::new(failed_entries)),
                in_flight: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                timeout: limits.timeout,
            }),
        }
    }

    /// Load one thumbnail.
    pub async fn load(&self, request: LoadRequest) -> LoadResult<LoadOutcome<D::Output>> {
        let key = request.key();
        if request.cancel.is_cancelled() {
            return Ok(LoadOutcome::Cancelled);
        }
        if let Some(hit) = self.inner.cache.get(&key) {
            tracing::trace!("Memory cache hit for {}", key);
            return Ok(LoadOutcome::Loaded(hit));
        }

        let (load, generation) = self.join_or_start(&key, &request);
        let _waiter = Waiter {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            generation,
        };

        tokio::select! {
            result = tokio::time::timeout(self.inner.timeout, load) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!("Load of {} timed out after {:?}", key, self.inner.timeout);
                    Err(LoadError::Timeout {
                        key: key.to_string(),
                        timeout_ms: self.inner.timeout.as_millis() as u64,
                    })
                }
            },
            _ = request.cancel.cancelled() => {
                tracing::debug!("Load of {} cancelled by caller", key);
                Ok(LoadOutcome::Cancelled)
            }
        }
    }

    /// Cached resource for `key`, if any.
    pub fn cached(&self, key: &CacheKey) -> Option<Arc<D::Output>> {
        self.inner.cache.get(key)
    }

    /// Whether the last finished load of `key` found no thumbnail.
    pub fn has_failed(&self, key: &CacheKey) -> bool {
        self.inner.failed.lock().contains(key)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Drop every cached resource and failure record.
    pub fn clear(&self) {
        self.inner.cache.clear();
        self.inner.failed.lock().clear();
    }

    pub fn decoder(&self) -> &D {
        &self.inner.decoder
    }

    fn join_or_start(&self, key: &CacheKey, request: &LoadRequest) -> (SharedLoad<D::Output>, u64) {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(entry) = in_flight.get_mut(key) {
            entry.waiters += 1;
            tracing::debug!("Joining in-flight load of {} ({} waiters)", key, entry.waiters);
            return (entry.load.clone(), entry.generation);
        }

        let fetcher = Arc::new(self.inner.source.fetcher_for(
            &request.uri,
            request.width,
            request.height,
        ));
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let load = Inner::run(
            Arc::clone(&self.inner),
            Arc::clone(&fetcher),
            generation,
            request.priority,
        )
        .boxed()
        .shared();

        in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                load: load.clone(),
                fetcher,
                waiters: 1,
            },
        );
        (load, generation)
    }
}

impl<D: ResourceDecoder + 'static> Inner<D> {
    async fn run(
        inner: Arc<Self>,
        fetcher: Arc<ThumbnailFetcher>,
        generation: u64,
        priority: Priority,
    ) -> LoadResult<LoadOutcome<D::Output>> {
        let key = fetcher.id().clone();
        let worker = {
            let inner = Arc::clone(&inner);
            let fetcher = Arc::clone(&fetcher);
            tokio::task::spawn_blocking(move || inner.fetch_and_decode(&fetcher, priority))
        };

        let result = match worker.await {
            Ok(result) => result,
            Err(e) => Err(LoadError::Worker {
                key: key.to_string(),
                message: e.to_string(),
            }),
        };
        inner.finish(&key, generation, &result);
        result
    }
}

impl<D: ResourceDecoder> Inner<D> {
    /// Runs on a blocking worker: fetch, then decode on the same thread.
    fn fetch_and_decode(
        &self,
        fetcher: &ThumbnailFetcher,
        priority: Priority,
    ) -> LoadResult<LoadOutcome<D::Output>> {
        let key = fetcher.id();
        let start = std::time::Instant::now();

        let data = fetcher
            .load_data(priority)
            .map_err(|source| LoadError::Fetch {
                key: key.to_string(),
                source,
            })?;
        let fetch_time = start.elapsed();

        if fetcher.is_cancelled() {
            tracing::debug!("Discarding fetched data for cancelled load of {}", key);
            return Ok(LoadOutcome::Cancelled);
        }

        let size = fetcher.size();
        let decoded = self
            .decoder
            .decode(data, size.width, size.height)
            .map_err(|source| LoadError::Decode {
                key: key.to_string(),
                source,
            })?;
        DataFetcher::cleanup(fetcher);

        tracing::trace!("  Fetch: {:?}, total: {:?}", fetch_time, start.elapsed());
        Ok(match decoded {
            Some(resource) => LoadOutcome::Loaded(Arc::new(resource)),
            None => LoadOutcome::NoResult,
        })
    }

    fn finish(&self, key: &CacheKey, generation: u64, result: &LoadResult<LoadOutcome<D::Output>>) {
        match result {
            Ok(LoadOutcome::Loaded(resource)) => {
                self.failed.lock().pop(key);
                self.cache.insert(key.clone(), Arc::clone(resource));
                tracing::debug!("Loaded {}", key);
            }
            Ok(LoadOutcome::NoResult) => {
                self.failed.lock().put(key.clone(), ());
                tracing::debug!("No thumbnail available for {}", key);
            }
            Ok(LoadOutcome::Cancelled) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Thumbnail load failed");
            }
        }

        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            in_flight.remove(key);
        }
    }

    fn detach(&self, key: &CacheKey, generation: u64) {
        let mut in_flight = self.in_flight.lock();
        let Some(entry) = in_flight.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            return;
        }

        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters == 0 {
            if let Some(entry) = in_flight.remove(key) {
                tracing::debug!("No callers left for {}, cancelling fetch", key);
                entry.fetcher.cancel();
            }
        }
    }
}

/// Detaches one caller from an in-flight load when dropped.
struct Waiter<D: ResourceDecoder> {
    inner: Arc<Inner<D>>,
    key: CacheKey,
    generation: u64,
}

impl<D: ResourceDecoder> Drop for Waiter<D> {
    fn drop(&mut self) {
        self.inner.detach(&self.key, self.generation);
    }
}
