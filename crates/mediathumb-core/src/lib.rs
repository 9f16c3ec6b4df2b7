//! Mediathumb Core - Embeddable thumbnail loading library.
//!
//! Mediathumb fetches pre-rendered thumbnails from a media index and feeds
//! them through a decode/cache pipeline without copying pixels. Loads are
//! cancellable, de-duplicated per key, and decoded images hand their buffers
//! back to a bitmap pool when they leave the cache.
//!
//! # Architecture
//!
//! ```text
//! content uri → ThumbnailFetcher → ThumbnailCarrier → decoder → PooledImage → MemoryCache
//!                    (index)          (no re-encode)    (still / animated)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use mediathumb_core::{
//!     Config, DirectoryMediaIndex, LoadRequest, LruBitmapPool, StillImageDecoder,
//!     ThumbnailPipeline, ThumbnailSource,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let index = Arc::new(DirectoryMediaIndex::from_config(&config));
//!     let pool = Arc::new(LruBitmapPool::new(config.pool.max_size_bytes()));
//!     let pipeline = ThumbnailPipeline::new(
//!         ThumbnailSource::new(index),
//!         StillImageDecoder::new(pool),
//!         &config,
//!     );
//!
//!     let outcome = pipeline.load(LoadRequest::new("content://media/42", 128, 128)).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod telemetry;

// Re-exports for convenient access
pub use config::Config;
pub use error::{
    ConfigError, DecodeError, IndexError, LoadError, LoadResult, MediathumbError, Result,
};
pub use index::{DirectoryMediaIndex, MediaIndex, StaticMediaIndex, ThumbnailSize};
pub use pipeline::{
    BitmapPool, CacheKey, LoadOutcome, LoadRequest, LruBitmapPool, NoopBitmapPool, PipelineLimits,
    PooledImage, Priority, StillFrameAnimation, StillImageDecoder, ThumbnailDecoder,
    ThumbnailFetcher, ThumbnailPipeline, ThumbnailSource,
};
pub use telemetry::{BreadcrumbLayer, CrashReporter, JsonlCrashReporter, LogBuffer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
