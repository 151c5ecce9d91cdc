//! Pixel-space coordinate types and the pixel-to-clip transform.
//!
//! Canonical CPU space:
//! - Pixels (the host pre-scales for device pixel ratio)
//! - Origin top-left
//! - +X right, +Y down
//!
//! The vertex shader converts to clip space by multiplying with
//! [`ScreenTransform`], uploaded as a uniform matrix.

mod rect;
mod transform;
mod vec2;
mod viewport;

pub use rect::Rect;
pub use transform::ScreenTransform;
pub use vec2::Vec2;
pub use viewport::Viewport;
