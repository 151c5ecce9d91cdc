//! Quad placement policy and the derived vertex buffers.

mod anchor;
mod geometry;

pub use anchor::{Anchor, QuadLayout};
pub use geometry::{GeometryBuffers, VERTEX_COUNT};
