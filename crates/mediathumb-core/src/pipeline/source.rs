//! Data handed from a fetcher to a decoder.
//!
//! The pipeline contract is shaped for encoded payloads that a format decoder
//! still has to parse. Media index thumbnails arrive already decoded, so they
//! travel as their own tagged variant instead of being re-encoded into bytes.

use image::DynamicImage;

/// An already-decoded thumbnail on its way from a fetcher to a decoder.
///
/// The image is `None` when the media index had nothing for the request. That
/// is a valid, cacheable outcome, not a failure. A carrier is immutable and
/// is consumed by value, so it can only ever be decoded once.
#[derive(Debug)]
pub struct ThumbnailCarrier {
    image: Option<DynamicImage>,
}

impl ThumbnailCarrier {
    /// Carry a retrieved thumbnail.
    pub fn new(image: DynamicImage) -> Self {
        Self { image: Some(image) }
    }

    /// Carry the "no such content" marker.
    pub fn absent() -> Self {
        Self { image: None }
    }

    /// Whether the media index had no content for the request.
    pub fn is_absent(&self) -> bool {
        self.image.is_none()
    }

    /// Borrow the carried image, if any.
    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    /// Give up the carried image without copying its pixels.
    pub fn into_image(self) -> Option<DynamicImage> {
        self.image
    }
}

/// Everything a fetcher can hand to a decoder.
#[derive(Debug)]
pub enum SourceData {
    /// Encoded bytes (JPEG, PNG, ...) a format decoder still has to parse
    Encoded(Vec<u8>),
    /// A decoded thumbnail from a media index
    Thumbnail(ThumbnailCarrier),
}

impl SourceData {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoded(_) => "encoded",
            Self::Thumbnail(_) => "thumbnail",
        }
    }
}

impl From<ThumbnailCarrier> for SourceData {
    fn from(carrier: ThumbnailCarrier) -> Self {
        Self::Thumbnail(carrier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_carrier() {
        let carrier = ThumbnailCarrier::absent();
        assert!(carrier.is_absent());
        assert!(carrier.image().is_none());
        assert!(carrier.into_image().is_none());
    }

    #[test]
    fn test_carrier_moves_pixels_out() {
        let image = DynamicImage::new_rgba8(16, 16);
        let pixels = image.as_bytes().as_ptr();

        let carrier = ThumbnailCarrier::new(image);
        assert!(!carrier.is_absent());

        let image = carrier.into_image().unwrap();
        assert_eq!(image.as_bytes().as_ptr(), pixels);
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceData::Encoded(vec![0xFF, 0xD8]).kind(), "encoded");
        assert_eq!(
            SourceData::from(ThumbnailCarrier::absent()).kind(),
            "thumbnail"
        );
    }
}
