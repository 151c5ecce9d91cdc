use crate::gfx::{BlendFunc, TextureSampling};
use crate::layout::QuadLayout;

/// Compositor behavior that does not change per frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Check shader compile status and drain API errors after each stage of
    /// a frame, logging them at `warn`. Costs a round trip per check on real
    /// drivers. Link status is checked regardless.
    pub strict_mode: bool,
    pub layout: QuadLayout,
    pub sampling: TextureSampling,
    pub blend: BlendFunc,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            strict_mode: cfg!(debug_assertions),
            layout: QuadLayout::default(),
            sampling: TextureSampling::default(),
            blend: BlendFunc::ALPHA_OVER,
        }
    }
}

impl CompositorConfig {
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_layout(mut self, layout: QuadLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_sampling(mut self, sampling: TextureSampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_blend(mut self, blend: BlendFunc) -> Self {
        self.blend = blend;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{FilterMode, WrapMode};
    use crate::layout::Anchor;

    #[test]
    fn default_reproduces_bottom_left_alpha_over() {
        let c = CompositorConfig::default();
        assert_eq!(c.layout.anchor, Anchor::BottomLeft);
        assert_eq!(c.layout.scale, 1.0);
        assert_eq!(c.blend, BlendFunc::ALPHA_OVER);
        assert_eq!(c.sampling.min_filter, FilterMode::Nearest);
        assert_eq!(c.sampling.mag_filter, FilterMode::Linear);
        assert_eq!(c.sampling.wrap_t, WrapMode::ClampToEdge);
        assert_eq!(c.strict_mode, cfg!(debug_assertions));
    }

    #[test]
    fn builders_override_single_fields() {
        let c = CompositorConfig::default()
            .with_strict_mode(false)
            .with_layout(QuadLayout::anchored(Anchor::Center));
        assert!(!c.strict_mode);
        assert_eq!(c.layout.anchor, Anchor::Center);
        assert_eq!(c.blend, BlendFunc::ALPHA_OVER);
    }
}
