use crate::coords::{Rect, Vec2, Viewport};

/// Viewport corner (or centre) the quad is pinned to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Image's bottom edge on the viewport's bottom edge, left edges aligned.
    #[default]
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    Center,
}

/// Placement and scaling of the image quad inside the viewport.
///
/// `scale` multiplies the image's pixel size (use the device pixel ratio to
/// avoid a stretched or shrunken overlay on dense displays). `offset` pushes
/// the quad away from the anchored edges, toward the viewport interior; it is
/// ignored on the axes `Center` centres.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadLayout {
    pub anchor: Anchor,
    pub scale: f32,
    pub offset: Vec2,
}

impl Default for QuadLayout {
    fn default() -> Self {
        Self {
            anchor: Anchor::BottomLeft,
            scale: 1.0,
            offset: Vec2::zero(),
        }
    }
}

impl QuadLayout {
    pub fn anchored(anchor: Anchor) -> Self {
        Self { anchor, ..Self::default() }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Pixel rectangle covered by an image of `image_size` pixels.
    ///
    /// A non-finite or non-positive scale falls back to 1.0, and a non-finite
    /// offset to zero.
    pub fn place(&self, viewport: Viewport, image_size: Vec2) -> Rect {
        let scale = if self.scale.is_finite() && self.scale > 0.0 { self.scale } else { 1.0 };
        let offset = if self.offset.is_finite() { self.offset } else { Vec2::zero() };
        let size = image_size * scale;
        let (vw, vh) = viewport.size_f32();
        let (dx, dy) = (offset.x, offset.y);

        let (x, y) = match self.anchor {
            Anchor::BottomLeft => (dx, vh - size.y - dy),
            Anchor::BottomRight => (vw - size.x - dx, vh - size.y - dy),
            Anchor::TopLeft => (dx, dy),
            Anchor::TopRight => (vw - size.x - dx, dy),
            Anchor::Center => ((vw - size.x) * 0.5, (vh - size.y) * 0.5),
        };

        Rect::from_origin_size(Vec2::new(x, y), size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp() -> Viewport {
        Viewport::new(1000, 2000).unwrap()
    }

    fn img() -> Vec2 {
        Vec2::new(100.0, 50.0)
    }

    #[test]
    fn bottom_left_is_default() {
        let r = QuadLayout::default().place(vp(), img());
        assert_eq!(r, Rect::new(0.0, 1950.0, 100.0, 50.0));
    }

    #[test]
    fn other_corners() {
        let at = |a| QuadLayout::anchored(a).place(vp(), img());
        assert_eq!(at(Anchor::BottomRight), Rect::new(900.0, 1950.0, 100.0, 50.0));
        assert_eq!(at(Anchor::TopLeft), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(at(Anchor::TopRight), Rect::new(900.0, 0.0, 100.0, 50.0));
        assert_eq!(at(Anchor::Center), Rect::new(450.0, 975.0, 100.0, 50.0));
    }

    #[test]
    fn scale_grows_from_anchor() {
        let r = QuadLayout::default().with_scale(2.0).place(vp(), img());
        assert_eq!(r, Rect::new(0.0, 1900.0, 200.0, 100.0));
    }

    #[test]
    fn invalid_scale_falls_back_to_one() {
        for s in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            let r = QuadLayout::default().with_scale(s).place(vp(), img());
            assert_eq!(r.size, img());
        }
    }

    #[test]
    fn offset_moves_inward() {
        let off = Vec2::new(10.0, 20.0);
        let bl = QuadLayout::default().with_offset(off).place(vp(), img());
        assert_eq!(bl.origin, Vec2::new(10.0, 1930.0));
        let tr = QuadLayout::anchored(Anchor::TopRight).with_offset(off).place(vp(), img());
        assert_eq!(tr.origin, Vec2::new(890.0, 20.0));
    }

    #[test]
    fn non_finite_offset_is_ignored() {
        for bad in [Vec2::new(f32::NAN, 4.0), Vec2::new(0.0, f32::INFINITY)] {
            let r = QuadLayout::default().with_offset(bad).place(vp(), img());
            assert_eq!(r, Rect::new(0.0, 1950.0, 100.0, 50.0));
        }
    }
}
