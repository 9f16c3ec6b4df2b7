//! Pixel buffer pooling.
//!
//! Decoded thumbnails are handed to the cache as [`PooledImage`]s. Dropping a
//! pooled image returns its pixel buffer to the pool it came from, so buffers
//! evicted from the cache can be reused for the next image of the same shape.

use image::{ColorType, DynamicImage, GenericImageView};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// A shared allocator of reusable pixel buffers.
///
/// Implementations are called from many decode workers at once and must do
/// their own locking.
pub trait BitmapPool: Send + Sync {
    /// Take a recycled buffer with exactly this shape, if one is available.
    ///
    /// The returned buffer's contents are unspecified.
    fn get(&self, width: u32, height: u32, color: ColorType) -> Option<DynamicImage>;

    /// Hand a buffer back. The pool may keep it or drop it.
    fn put(&self, image: DynamicImage);

    /// Drop every pooled buffer.
    fn clear(&self);

    /// Drop the oldest buffers until at most `max_bytes` remain.
    fn trim(&self, max_bytes: u64);

    /// Bytes currently held by the pool.
    fn size_bytes(&self) -> u64;
}

/// A pool that never keeps anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBitmapPool;

impl BitmapPool for NoopBitmapPool {
    fn get(&self, _width: u32, _height: u32, _color: ColorType) -> Option<DynamicImage> {
        None
    }

    fn put(&self, _image: DynamicImage) {}

    fn clear(&self) {}

    fn trim(&self, _max_bytes: u64) {}

    fn size_bytes(&self) -> u64 {
        0
    }
}

/// Hit/miss counters for a [`LruBitmapPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct PoolState {
    // Oldest first.
    buffers: VecDeque<DynamicImage>,
    size_bytes: u64,
    stats: PoolStats,
}

impl PoolState {
    fn evict_to(&mut self, max_bytes: u64) -> usize {
        let mut evicted = 0;
        while self.size_bytes > max_bytes {
            let Some(buffer) = self.buffers.pop_front() else {
                break;
            };
            self.size_bytes -= buffer_bytes(&buffer);
            self.stats.evictions += 1;
            evicted += 1;
        }
        evicted
    }
}

/// A byte-bounded pool evicting the least recently returned buffers first.
pub struct LruBitmapPool {
    max_bytes: u64,
    state: Mutex<PoolState>,
}

impl LruBitmapPool {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats
    }
}

impl BitmapPool for LruBitmapPool {
    fn get(&self, width: u32, height: u32, color: ColorType) -> Option<DynamicImage> {
        let mut state = self.state.lock();
        let position = state
            .buffers
            .iter()
            .rposition(|b| b.dimensions() == (width, height) && b.color() == color);

        match position.and_then(|i| state.buffers.remove(i)) {
            Some(buffer) => {
                state.size_bytes -= buffer_bytes(&buffer);
                state.stats.hits += 1;
                tracing::trace!("Bitmap pool hit for {}x{} {:?}", width, height, color);
                Some(buffer)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    fn put(&self, image: DynamicImage) {
        let bytes = buffer_bytes(&image);
        if bytes == 0 || bytes > self.max_bytes {
            return;
        }

        let mut state = self.state.lock();
        state.stats.puts += 1;
        state.size_bytes += bytes;
        state.buffers.push_back(image);
        state.evict_to(self.max_bytes);
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.buffers.clear();
        state.size_bytes = 0;
    }

    fn trim(&self, max_bytes: u64) {
        let evicted = self.state.lock().evict_to(max_bytes);
        if evicted > 0 {
            tracing::debug!("Trimmed {} buffers from bitmap pool", evicted);
        }
    }

    fn size_bytes(&self) -> u64 {
        self.state.lock().size_bytes
    }
}

fn buffer_bytes(image: &DynamicImage) -> u64 {
    image.as_bytes().len() as u64
}

/// A decoded image whose pixel buffer returns to a [`BitmapPool`] on drop.
///
/// Wrapping moves the image in; its pixels are never copied. Each decoded
/// image has exactly one owner, so there is only ever one wrapper per buffer.
pub struct PooledImage {
    image: DynamicImage,
    pool: Arc<dyn BitmapPool>,
}

impl PooledImage {
    /// Wrap `image` so its buffer is reclaimed by `pool` when released.
    pub fn new(image: DynamicImage, pool: Arc<dyn BitmapPool>) -> Self {
        Self { image, pool }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size_bytes(&self) -> usize {
        self.image.as_bytes().len()
    }

    /// Detach the image from the pool and take ownership of it.
    pub fn into_inner(mut self) -> DynamicImage {
        std::mem::replace(&mut self.image, empty_image())
    }
}

impl fmt::Debug for PooledImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.image.color())
            .finish()
    }
}

impl Drop for PooledImage {
    fn drop(&mut self) {
        let image = std::mem::replace(&mut self.image, empty_image());
        if !image.as_bytes().is_empty() {
            self.pool.put(image);
        }
    }
}

// Zero-sized, so it never allocates.
fn empty_image() -> DynamicImage {
    DynamicImage::new_luma8(0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RGBA_16: u64 = 16 * 16 * 4;

    #[test]
    fn test_drop_returns_buffer_to_pool() {
        let pool = Arc::new(LruBitmapPool::new(1024 * 1024));
        let image = DynamicImage::new_rgba8(16, 16);
        let pixels = image.as_bytes().as_ptr();

        let pooled = PooledImage::new(image, pool.clone());
        assert_eq!(pool.len(), 0);
        drop(pooled);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.size_bytes(), RGBA_16);

        let reused = pool.get(16, 16, ColorType::Rgba8).unwrap();
        assert_eq!(reused.as_bytes().as_ptr(), pixels);
        assert_eq!(pool.size_bytes(), 0);
    }

    #[test]
    fn test_get_requires_matching_shape() {
        let pool = LruBitmapPool::new(1024 * 1024);
        pool.put(DynamicImage::new_rgba8(16, 16));

        assert!(pool.get(16, 16, ColorType::Rgb8).is_none());
        assert!(pool.get(8, 16, ColorType::Rgba8).is_none());
        assert!(pool.get(16, 16, ColorType::Rgba8).is_some());

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_put_evicts_oldest_over_budget() {
        let pool = LruBitmapPool::new(RGBA_16 * 2);
        pool.put(DynamicImage::new_rgba8(16, 16));
        pool.put(DynamicImage::new_rgb8(16, 16));
        pool.put(DynamicImage::new_rgba8(16, 16));

        assert!(pool.size_bytes() <= RGBA_16 * 2);
        assert_eq!(pool.stats().evictions, 1);
        // The oldest rgba buffer went first; the rgb one survived.
        assert!(pool.get(16, 16, ColorType::Rgb8).is_some());
    }

    #[test]
    fn test_oversized_buffer_is_dropped() {
        let pool = LruBitmapPool::new(64);
        pool.put(DynamicImage::new_rgba8(16, 16));
        assert!(pool.is_empty());
        assert_eq!(pool.stats().puts, 0);
    }

    #[test]
    fn test_into_inner_detaches_from_pool() {
        let pool = Arc::new(LruBitmapPool::new(1024 * 1024));
        let pooled = PooledImage::new(DynamicImage::new_rgba8(4, 4), pool.clone());

        let image = pooled.into_inner();
        assert_eq!(image.width(), 4);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_clear() {
        let pool = LruBitmapPool::new(1024 * 1024);
        pool.put(DynamicImage::new_rgba8(16, 16));
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.size_bytes(), 0);
    }

    #[test]
    fn test_trim_drops_oldest_first() {
        let pool = LruBitmapPool::new(1024 * 1024);
        pool.put(DynamicImage::new_rgba8(16, 16));
        pool.put(DynamicImage::new_rgb8(16, 16));
        pool.put(DynamicImage::new_luma8(16, 16));

        pool.trim(RGBA_16);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.size_bytes(), 16 * 16 * 3 + 16 * 16);
        assert_eq!(pool.stats().evictions, 1);
        assert!(pool.get(16, 16, ColorType::Rgba8).is_none());

        pool.trim(0);
        assert!(pool.is_empty());
        assert_eq!(pool.stats().evictions, 3);
    }

    #[test]
    fn test_noop_pool_keeps_nothing() {
        let pool = NoopBitmapPool;
        pool.put(DynamicImage::new_rgba8(4, 4));
        assert!(pool.get(4, 4, ColorType::Rgba8).is_none());
        assert_eq!(pool.size_bytes(), 0);
    }
}
