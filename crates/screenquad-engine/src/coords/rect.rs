use super::Vec2;

/// Axis-aligned rectangle in pixels (top-left origin, +Y down).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.origin.x + self.size.x, self.origin.y + self.size.y)
    }

    /// Corners in triangle-strip order: (min.x, min.y), (min.x, max.y),
    /// (max.x, min.y), (max.x, max.y).
    ///
    /// The first and last triangles share the (min.x, max.y)-(max.x, min.y)
    /// diagonal.
    #[inline]
    pub fn strip_corners(self) -> [Vec2; 4] {
        let (lo, hi) = (self.min(), self.max());
        [
            Vec2::new(lo.x, lo.y),
            Vec2::new(lo.x, hi.y),
            Vec2::new(hi.x, lo.y),
            Vec2::new(hi.x, hi.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_corners_order() {
        let c = Rect::new(10.0, 20.0, 30.0, 40.0).strip_corners();
        assert_eq!(c[0], Vec2::new(10.0, 20.0));
        assert_eq!(c[1], Vec2::new(10.0, 60.0));
        assert_eq!(c[2], Vec2::new(40.0, 20.0));
        assert_eq!(c[3], Vec2::new(40.0, 60.0));
    }

    #[test]
    fn max_is_origin_plus_size() {
        let r = Rect::from_origin_size(Vec2::new(-5.0, 2.0), Vec2::new(10.0, 3.0));
        assert_eq!(r.min(), Vec2::new(-5.0, 2.0));
        assert_eq!(r.max(), Vec2::new(5.0, 5.0));
    }
}
