use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::coords::Vec2;
use crate::error::CompositorError;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Decoded RGBA8 bitmap shared with the compositor.
///
/// Every constructed image receives a process-unique generation id. Clones
/// share both pixels and generation, so the compositor can tell a genuinely new
/// image from the same one handed back again.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Arc<RgbaImage>,
    generation: u64,
}

impl SourceImage {
    /// Wraps raw RGBA8 pixels (row-major, top row first).
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CompositorError> {
        if width == 0 || height == 0 {
            return Err(CompositorError::InvalidImage(format!(
                "image has zero size ({width}x{height})"
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        if expected != Some(pixels.len()) {
            return Err(CompositorError::InvalidImage(format!(
                "expected {width}x{height}x4 bytes of RGBA8, got {}",
                pixels.len()
            )));
        }
        let buffer = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            CompositorError::InvalidImage(format!("{width}x{height} does not fit an RGBA8 buffer"))
        })?;
        Self::from_image(buffer)
    }

    pub fn from_image(buffer: RgbaImage) -> Result<Self, CompositorError> {
        if buffer.width() == 0 || buffer.height() == 0 {
            return Err(CompositorError::InvalidImage("image has zero size".into()));
        }
        Ok(Self {
            pixels: Arc::new(buffer),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Decodes any format the `image` crate was built with and converts to RGBA8.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CompositorError> {
        let path = path.as_ref();
        let decoded = image::open(path)?;
        log::debug!(
            "decoded {} ({}x{}, {:?})",
            path.display(),
            decoded.width(),
            decoded.height(),
            decoded.color()
        );
        Self::from_image(decoded.into_rgba8())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }

    /// Tightly packed RGBA8 rows, top row first.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32) -> SourceImage {
        SourceImage::from_rgba(w, h, vec![255; (w * h * 4) as usize]).unwrap()
    }

    #[test]
    fn wraps_exact_buffer() {
        let img = solid(4, 2);
        assert_eq!((img.width(), img.height()), (4, 2));
        assert_eq!(img.pixels().len(), 32);
        assert_eq!(img.size(), Vec2::new(4.0, 2.0));
    }

    #[test]
    fn rejects_short_buffer() {
        let err = SourceImage::from_rgba(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, CompositorError::InvalidImage(_)));
    }

    #[test]
    fn rejects_long_buffer() {
        let err = SourceImage::from_rgba(1, 1, vec![7; 12]).unwrap_err();
        assert!(matches!(err, CompositorError::InvalidImage(_)));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(SourceImage::from_rgba(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn generations_are_unique_and_shared_by_clones() {
        let a = solid(1, 1);
        let b = solid(1, 1);
        assert_ne!(a.generation(), b.generation());
        assert_eq!(a.clone().generation(), a.generation());
    }

    #[test]
    fn clones_share_pixels() {
        let a = solid(2, 2);
        let b = a.clone();
        assert_eq!(a.pixels().as_ptr(), b.pixels().as_ptr());
    }

    #[test]
    fn open_missing_file_is_decode_error() {
        let err = SourceImage::open("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, CompositorError::ImageDecode(_)));
    }
}
