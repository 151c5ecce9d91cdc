use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Vec2, Viewport};

use super::QuadLayout;

/// Vertices per quad (triangle strip).
pub const VERTEX_COUNT: u32 = 4;

/// Unit-square texture coordinates, parallel to the strip order of
/// [`Rect::strip_corners`]: the quad's top row samples the image's top row.
const TEX_COORDS: [[f32; 2]; 4] = [
    [0.0, 0.0],
    [0.0, 1.0],
    [1.0, 0.0],
    [1.0, 1.0],
];

/// Pixel-space positions and texture coordinates for the image quad.
///
/// Vertex order V1..V4 is shared by both buffers:
///
/// ```text
/// V1 (x0, y0)  uv (0, 0)
/// V2 (x0, y1)  uv (0, 1)
/// V3 (x1, y0)  uv (1, 0)
/// V4 (x1, y1)  uv (1, 1)
/// ```
///
/// Drawn as a triangle strip this yields (V1, V2, V3) and (V2, V3, V4).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GeometryBuffers {
    positions: [[f32; 2]; 4],
    tex_coords: [[f32; 2]; 4],
}

impl GeometryBuffers {
    pub fn compute(viewport: Viewport, image_size: Vec2, layout: &QuadLayout) -> Self {
        let rect = layout.place(viewport, image_size);
        Self {
            positions: rect.strip_corners().map(Vec2::to_array),
            tex_coords: TEX_COORDS,
        }
    }

    #[inline]
    pub fn positions(&self) -> &[[f32; 2]; 4] {
        &self.positions
    }

    #[inline]
    pub fn tex_coords(&self) -> &[[f32; 2]; 4] {
        &self.tex_coords
    }

    /// Pixel rectangle spanned by the quad.
    pub fn rect(&self) -> Rect {
        let lo = Vec2::from(self.positions[0]);
        let hi = Vec2::from(self.positions[3]);
        Rect::from_origin_size(lo, hi - lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Anchor;

    fn vp(w: u32, h: u32) -> Viewport {
        Viewport::new(w, h).unwrap()
    }

    #[test]
    fn bottom_left_anchor_sits_on_bottom_edge() {
        let layout = QuadLayout::default();
        let g = GeometryBuffers::compute(vp(1000, 2000), Vec2::new(100.0, 100.0), &layout);
        assert_eq!(g.positions()[0], [0.0, 1900.0]);
        assert_eq!(g.positions()[3], [100.0, 2000.0]);
    }

    #[test]
    fn anchored_corners_hold_for_any_fitting_image() {
        let v = vp(640, 480);
        for (w, h) in [(1.0, 1.0), (64.0, 32.0), (640.0, 480.0), (13.0, 479.0)] {
            let g = GeometryBuffers::compute(v, Vec2::new(w, h), &QuadLayout::default());
            assert_eq!(g.positions()[0], [0.0, 480.0 - h]);
            assert_eq!(g.positions()[3], [w, 480.0]);
        }
    }

    #[test]
    fn tex_coords_follow_strip_order() {
        let g = GeometryBuffers::compute(vp(10, 10), Vec2::new(5.0, 5.0), &Default::default());
        // Each vertex's uv equals its position normalised within the quad.
        let r = g.rect();
        for (p, uv) in g.positions().iter().zip(g.tex_coords()) {
            assert_eq!((p[0] - r.origin.x) / r.size.x, uv[0]);
            assert_eq!((p[1] - r.origin.y) / r.size.y, uv[1]);
        }
    }

    #[test]
    fn strip_triangles_share_the_diagonal() {
        let g = GeometryBuffers::compute(vp(10, 10), Vec2::new(4.0, 4.0), &Default::default());
        let p = g.positions();
        // Second triangle is (V2, V3, V4); V2/V3 are the shared diagonal.
        assert_eq!(p[1][0], p[0][0]);
        assert_eq!(p[2][1], p[0][1]);
        assert_ne!(p[1], p[2]);
    }

    #[test]
    fn oversized_image_extends_past_top_edge() {
        let layout = QuadLayout::default();
        let g = GeometryBuffers::compute(vp(100, 100), Vec2::new(50.0, 150.0), &layout);
        assert_eq!(g.positions()[0], [0.0, -50.0]);
    }

    #[test]
    fn repeated_computation_is_identical() {
        let layout = QuadLayout::anchored(Anchor::Center).with_scale(1.5);
        let a = GeometryBuffers::compute(vp(333, 777), Vec2::new(17.0, 29.0), &layout);
        let b = GeometryBuffers::compute(vp(333, 777), Vec2::new(17.0, 29.0), &layout);
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
    }
}
