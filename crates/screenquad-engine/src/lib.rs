//! Screen-space image compositor.
//!
//! Uploads a raster image once and draws it every frame as an alpha-blended,
//! pixel-positioned quad on top of a host's framebuffer. The compositor talks
//! to the GPU only through [`gfx::GraphicsApi`], which the host passes in on
//! every call; a wgpu backend and a call-recording fake are provided.
//!
//! The `device`, `core` and `window` modules form a small winit + wgpu host
//! runtime used by the viewer binary.

pub mod bitmap;
pub mod compositor;
pub mod coords;
pub mod error;
pub mod gfx;
pub mod layout;

pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod window;

pub use bitmap::SourceImage;
pub use compositor::{CompositorConfig, ScreenSpaceCompositor};
pub use coords::{ScreenTransform, Viewport};
pub use error::CompositorError;
pub use gfx::GraphicsApi;
pub use layout::{Anchor, GeometryBuffers, QuadLayout};
