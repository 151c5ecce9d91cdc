use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use screenquad_engine::{Anchor, CompositorConfig, QuadLayout};
use screenquad_engine::coords::Vec2;

#[derive(Parser, Debug, Clone)]
#[command(name = "screenquad-viewer")]
#[command(about = "Composites an image over a window in screen space", long_about = None)]
pub struct Cli {
    /// Image to draw (PNG, JPEG, BMP, GIF, TIFF or WebP)
    #[arg(long, short)]
    pub image: PathBuf,

    /// Viewport corner the image is pinned to
    #[arg(long, value_enum, default_value_t = AnchorArg::BottomLeft)]
    pub anchor: AnchorArg,

    /// Multiplier on the image's pixel size
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// Pixel margin from the anchored edges
    #[arg(long, default_value_t = 0.0)]
    pub margin: f32,

    /// Check shader compilation and log graphics errors every frame
    #[arg(long, conflicts_with = "lenient")]
    pub strict: bool,

    /// Skip per-frame error checks even in debug builds
    #[arg(long)]
    pub lenient: bool,

    /// Log filter, in env_logger syntax (overrides RUST_LOG)
    #[arg(long)]
    pub log: Option<String>,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AnchorArg {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    Center,
}

impl From<AnchorArg> for Anchor {
    fn from(a: AnchorArg) -> Self {
        match a {
            AnchorArg::BottomLeft => Anchor::BottomLeft,
            AnchorArg::BottomRight => Anchor::BottomRight,
            AnchorArg::TopLeft => Anchor::TopLeft,
            AnchorArg::TopRight => Anchor::TopRight,
            AnchorArg::Center => Anchor::Center,
        }
    }
}

impl Cli {
    pub fn compositor_config(&self) -> CompositorConfig {
        let layout = QuadLayout::anchored(self.anchor.into())
            .with_scale(self.scale)
            .with_offset(Vec2::new(self.margin, self.margin));

        let config = CompositorConfig::default().with_layout(layout);
        match (self.strict, self.lenient) {
            (true, _) => config.with_strict_mode(true),
            (_, true) => config.with_strict_mode(false),
            _ => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_bottom_left_overlay() {
        let cli = Cli::try_parse_from(["screenquad-viewer", "--image", "logo.png"]).unwrap();
        let config = cli.compositor_config();
        assert_eq!(config.layout, QuadLayout::default());
        assert_eq!(config.strict_mode, cfg!(debug_assertions));
        assert_eq!((cli.width, cli.height), (1280, 720));
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "screenquad-viewer",
            "-i",
            "logo.png",
            "--anchor",
            "top-right",
            "--scale",
            "2",
            "--margin",
            "8",
            "--lenient",
        ])
        .unwrap();
        let config = cli.compositor_config();
        assert_eq!(config.layout.anchor, Anchor::TopRight);
        assert_eq!(config.layout.scale, 2.0);
        assert_eq!(config.layout.offset, Vec2::new(8.0, 8.0));
        assert!(!config.strict_mode);
    }

    #[test]
    fn strict_and_lenient_conflict() {
        let parsed = Cli::try_parse_from([
            "screenquad-viewer",
            "--image",
            "a.png",
            "--strict",
            "--lenient",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn image_is_required() {
        assert!(Cli::try_parse_from(["screenquad-viewer"]).is_err());
    }
}
