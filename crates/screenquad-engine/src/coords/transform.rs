use bytemuck::{Pod, Zeroable};

use super::{Vec2, Viewport};

/// Orthographic pixel-to-clip matrix, column-major.
///
/// Maps pixel coordinates (origin top-left, +Y down) to clip space (origin
/// centre, +Y up):
///
/// ```text
/// clip_x = 2 * px / W - 1
/// clip_y = 1 - 2 * py / H
/// ```
///
/// Z is flattened to 0. No aspect or device-pixel-ratio correction is applied;
/// that belongs to the layout's `scale`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ScreenTransform {
    cols: [f32; 16],
}

impl ScreenTransform {
    pub fn from_viewport(viewport: Viewport) -> Self {
        let (w, h) = viewport.size_f32();
        #[rustfmt::skip]
        let cols = [
            2.0 / w, 0.0,      0.0, 0.0,
            0.0,     -2.0 / h, 0.0, 0.0,
            0.0,     0.0,      0.0, 0.0,
            -1.0,    1.0,      0.0, 1.0,
        ];
        Self { cols }
    }

    /// The 16 matrix entries in column-major order, as uploaded to the GPU.
    #[inline]
    pub fn as_cols(&self) -> &[f32; 16] {
        &self.cols
    }

    /// Main diagonal `(m00, m11, m22, m33)`.
    #[inline]
    pub fn diagonal(&self) -> [f32; 4] {
        [self.cols[0], self.cols[5], self.cols[10], self.cols[15]]
    }

    /// Transforms a pixel position `(x, y, 0, 1)` and returns clip-space `(x, y)`.
    pub fn apply(&self, p: Vec2) -> Vec2 {
        let m = &self.cols;
        let x = m[0] * p.x + m[4] * p.y + m[12];
        let y = m[1] * p.x + m[5] * p.y + m[13];
        let w = m[3] * p.x + m[7] * p.y + m[15];
        Vec2::new(x / w, y / w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn transform(w: u32, h: u32) -> ScreenTransform {
        ScreenTransform::from_viewport(Viewport::new(w, h).unwrap())
    }

    #[test]
    fn origin_maps_to_top_left_clip_corner() {
        for (w, h) in [(1, 1), (300, 300), (1000, 2000), (1920, 1080), (7, 13)] {
            let t = transform(w, h);
            assert!(t.apply(Vec2::zero()).approx_eq(Vec2::new(-1.0, 1.0), EPS), "{w}x{h}");
        }
    }

    #[test]
    fn far_corner_maps_to_bottom_right_clip_corner() {
        for (w, h) in [(1, 1), (300, 300), (1000, 2000), (1920, 1080), (7, 13)] {
            let t = transform(w, h);
            let far = Vec2::new(w as f32, h as f32);
            assert!(t.apply(far).approx_eq(Vec2::new(1.0, -1.0), 1e-5), "{w}x{h}");
        }
    }

    #[test]
    fn centre_maps_to_clip_origin() {
        let t = transform(300, 300);
        assert!(t.apply(Vec2::new(150.0, 150.0)).approx_eq(Vec2::zero(), EPS));
    }

    #[test]
    fn tall_viewport_diagonal() {
        let d = transform(1000, 2000).diagonal();
        assert!((d[0] - 0.002).abs() < EPS);
        assert!((d[1] + 0.001).abs() < EPS);
        assert_eq!(d[2], 0.0);
        assert_eq!(d[3], 1.0);
    }

    #[test]
    fn translation_lives_in_last_column() {
        let t = transform(640, 480);
        let c = t.as_cols();
        assert_eq!(&c[12..16], &[-1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let v = Viewport::new(1000, 2000).unwrap();
        let a = ScreenTransform::from_viewport(v);
        let b = ScreenTransform::from_viewport(v);
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
    }
}
