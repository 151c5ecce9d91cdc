//! Graphics API seam.
//!
//! The compositor never talks to a GPU library directly. It issues calls on a
//! [`GraphicsApi`] that the host passes in by `&mut` for every operation, so
//! there is no hidden ambient context and tests can substitute
//! [`recording::RecordingApi`] for a real device.
//!
//! The call set is shaped after an immediate-mode GL ES 2 pipeline (programs,
//! attribute/uniform locations, bound texture, blend toggle). The wgpu backend
//! in [`wgpu_api`] maps that model onto pipelines and render passes.

mod api;
mod types;

pub mod recording;
pub mod wgpu_api;

pub use api::GraphicsApi;
pub use types::{
    ApiError, ApiLimits, AttribLocation, BindState, BlendFactor, BlendFunc, FilterMode,
    ProgramHandle, ShaderHandle, ShaderStage, TextureHandle, TextureSampling, UniformLocation,
    WrapMode,
};
