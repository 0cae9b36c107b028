use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbaImage;

/// Decoded icon whose pixel buffer can be released explicitly
///
/// Clones share the same buffer. After [`recycle`](Self::recycle) the pixels
/// are dropped for every clone and [`with_pixels`](Self::with_pixels) yields
/// `None`; the dimensions and byte count stay readable.
#[derive(Debug, Clone)]
pub struct IconBitmap {
    inner: Arc<BitmapInner>,
}

#[derive(Debug)]
struct BitmapInner {
    pixels: Mutex<Option<RgbaImage>>,
    width: u32,
    height: u32,
    byte_count: usize,
    recycled: AtomicBool,
}

impl IconBitmap {
    pub fn new(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let byte_count = image.as_raw().len();
        Self {
            inner: Arc::new(BitmapInner {
                pixels: Mutex::new(Some(image)),
                width,
                height,
                byte_count,
                recycled: AtomicBool::new(false),
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Resident size of the decoded pixels
    pub fn byte_count(&self) -> usize {
        self.inner.byte_count
    }

    pub fn is_recycled(&self) -> bool {
        self.inner.recycled.load(Ordering::Acquire)
    }

    /// Release the pixel buffer; idempotent
    pub fn recycle(&self) {
        let mut pixels = self
            .inner
            .pixels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *pixels = None;
        self.inner.recycled.store(true, Ordering::Release);
    }

    /// Run `f` on the pixels unless the bitmap has been recycled
    pub fn with_pixels<R>(&self, f: impl FnOnce(&RgbaImage) -> R) -> Option<R> {
        let pixels = self
            .inner
            .pixels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pixels.as_ref().map(f)
    }

    pub fn ptr_eq(&self, other: &IconBitmap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_count_is_rgba_size() {
        let bitmap = IconBitmap::new(RgbaImage::new(4, 3));
        assert_eq!(bitmap.byte_count(), 48);
        assert_eq!((bitmap.width(), bitmap.height()), (4, 3));
    }

    #[test]
    fn test_recycle_releases_pixels_for_all_clones() {
        let bitmap = IconBitmap::new(RgbaImage::new(2, 2));
        let clone = bitmap.clone();
        assert_eq!(clone.with_pixels(|p| p.width()), Some(2));

        bitmap.recycle();
        assert!(clone.is_recycled());
        assert!(clone.with_pixels(|p| p.width()).is_none());
        assert!(bitmap.ptr_eq(&clone));
    }
}
