//! Errors surfaced by the compositor to its host.
//!
//! Per-call graphics API errors never reach the host; they are logged in
//! strict mode, see [`crate::gfx::ApiError`].

use thiserror::Error;

use crate::gfx::ShaderStage;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("viewport must have a non-zero size (got {width}x{height})")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid source image: {0}")]
    InvalidImage(String),

    #[error("failed to decode source image")]
    ImageDecode(#[from] image::ImageError),

    #[error("{stage:?} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("program failed to link: {log}")]
    ProgramLink { log: String },
}
