//! Thumbnail loading pipeline components.
//!
//! This module contains all the stages a thumbnail passes through:
//! - **source**: The data handed from a fetcher to a decoder
//! - **fetch**: Cancellable retrieval from a media index
//! - **pool**: Reusable pixel buffers
//! - **decode**: Still and animated thumbnail decoders
//! - **cache**: Byte-bounded memory cache
//! - **driver**: Orchestrates fetch, decode and caching

pub mod cache;
pub mod decode;
pub mod driver;
pub mod fetch;
pub mod pool;
pub mod source;

// Re-exports for convenient access
pub use cache::{CacheStats, MemoryCache};
pub use decode::{ImageResource, ResourceDecoder, StillFrameAnimation, StillImageDecoder, ThumbnailDecoder};
pub use driver::{LoadOutcome, LoadRequest, PipelineLimits, ThumbnailPipeline};
pub use fetch::{CacheKey, DataFetcher, Priority, ThumbnailFetcher, ThumbnailSource};
pub use pool::{BitmapPool, LruBitmapPool, NoopBitmapPool, PoolStats, PooledImage};
pub use source::{SourceData, ThumbnailCarrier};
