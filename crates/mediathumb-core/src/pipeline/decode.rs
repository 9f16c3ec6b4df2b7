//! Decoders that unwrap media index thumbnails into pooled resources.
//!
//! There is nothing to parse here: the fetcher already produced a decoded
//! image. Decoding only checks that the data really is a
//! [`ThumbnailCarrier`] and moves its image into a [`PooledImage`].

use image::DynamicImage;
use std::sync::Arc;

use super::pool::{BitmapPool, PooledImage};
use super::source::{SourceData, ThumbnailCarrier};
use crate::error::DecodeError;

/// A decoded, cacheable image resource.
pub trait ImageResource: Send + Sync + 'static {
    /// The image to display.
    fn image(&self) -> &DynamicImage;

    /// Memory held by the resource, used for cache accounting.
    fn size_bytes(&self) -> usize {
        self.image().as_bytes().len()
    }
}

impl ImageResource for PooledImage {
    fn image(&self) -> &DynamicImage {
        PooledImage::image(self)
    }
}

/// Turns fetched [`SourceData`] into a resource.
pub trait ResourceDecoder: Send + Sync {
    type Output: ImageResource;

    /// Decode `source` for a `width`×`height` target.
    ///
    /// `Ok(None)` means there was nothing to decode; callers treat it as a
    /// failed load, not as an error.
    fn decode(
        &self,
        source: SourceData,
        width: u32,
        height: u32,
    ) -> Result<Option<Self::Output>, DecodeError>;

    /// Identity mixed into disk cache keys. Empty for decoders without a
    /// byte format to key on.
    fn id(&self) -> &str;
}

fn expect_carrier(decoder: &'static str, source: SourceData) -> Result<ThumbnailCarrier, DecodeError> {
    match source {
        SourceData::Thumbnail(carrier) => Ok(carrier),
        other => {
            let found = other.kind();
            tracing::error!(
                "{} received a {} source; it must only be wired to the media index fetcher",
                decoder,
                found
            );
            Err(DecodeError::UnexpectedSource { decoder, found })
        }
    }
}

/// Static-only decoder producing a [`PooledImage`].
pub struct StillImageDecoder {
    pool: Arc<dyn BitmapPool>,
}

impl StillImageDecoder {
    pub fn new(pool: Arc<dyn BitmapPool>) -> Self {
        Self { pool }
    }
}

impl ResourceDecoder for StillImageDecoder {
    type Output = PooledImage;

    fn decode(
        &self,
        source: SourceData,
        _width: u32,
        _height: u32,
    ) -> Result<Option<PooledImage>, DecodeError> {
        let carrier = expect_carrier("StillImageDecoder", source)?;
        Ok(carrier
            .into_image()
            .map(|image| PooledImage::new(image, Arc::clone(&self.pool))))
    }

    fn id(&self) -> &str {
        ""
    }
}

/// A single still frame dressed as an animation.
///
/// Consumers of animation-aware pipelines expect this shape; thumbnails are
/// never actually animated.
#[derive(Debug)]
pub struct StillFrameAnimation {
    frame: PooledImage,
}

impl StillFrameAnimation {
    pub fn new(frame: PooledImage) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &PooledImage {
        &self.frame
    }

    pub fn frame_count(&self) -> usize {
        1
    }

    pub fn is_animated(&self) -> bool {
        false
    }

    pub fn into_frame(self) -> PooledImage {
        self.frame
    }
}

impl ImageResource for StillFrameAnimation {
    fn image(&self) -> &DynamicImage {
        self.frame.image()
    }
}

/// Animation-capable decoder producing a [`StillFrameAnimation`].
pub struct ThumbnailDecoder {
    pool: Arc<dyn BitmapPool>,
}

impl ThumbnailDecoder {
    pub fn new(pool: Arc<dyn BitmapPool>) -> Self {
        Self { pool }
    }
}

impl ResourceDecoder for ThumbnailDecoder {
    type Output = StillFrameAnimation;

    fn decode(
        &self,
        source: SourceData,
        _width: u32,
        _height: u32,
    ) -> Result<Option<StillFrameAnimation>, DecodeError> {
        let carrier = expect_carrier("ThumbnailDecoder", source)?;
        Ok(carrier.into_image().map(|image| {
            StillFrameAnimation::new(PooledImage::new(image, Arc::clone(&self.pool)))
        }))
    }

    fn id(&self) -> &str {
        ""
    }
}
