//! Per-frame handles handed to GPU-backed renderers.
//!
//! Convention:
//! - geometry arrives in pixels (top-left origin, +Y down)
//! - renderers draw on top of whatever the target already holds (`LoadOp::Load`)

mod ctx;

pub use ctx::{RenderCtx, RenderTarget};
