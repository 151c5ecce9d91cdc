//! GPU device + surface management.
//!
//! Creates the wgpu device for a window, keeps the surface configured across
//! resizes, and hands out one encoder + color view per frame. The compositor
//! never sees these types directly; hosts wrap them in a
//! [`RenderCtx`](crate::render::RenderCtx) and feed the wgpu graphics backend.

mod frame;
mod gpu;
mod init;
mod surface;

pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
