use crate::error::CompositorError;

/// Viewport size in pixels.
///
/// Both dimensions are strictly positive; this is checked once at construction
/// so the screen transform never divides by zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Result<Self, CompositorError> {
        if width == 0 || height == 0 {
            return Err(CompositorError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub const fn width(self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(self) -> u32 {
        self.height
    }

    /// `(width, height)` as floats, the form the geometry code works in.
    #[inline]
    pub fn size_f32(self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_width() {
        let err = Viewport::new(0, 10).unwrap_err();
        assert!(matches!(err, CompositorError::InvalidViewport { width: 0, height: 10 }));
    }

    #[test]
    fn rejects_zero_height() {
        assert!(Viewport::new(10, 0).is_err());
    }

    #[test]
    fn accepts_positive_size() {
        let v = Viewport::new(1000, 2000).unwrap();
        assert_eq!((v.width(), v.height()), (1000, 2000));
        assert_eq!(v.size_f32(), (1000.0, 2000.0));
    }
}
