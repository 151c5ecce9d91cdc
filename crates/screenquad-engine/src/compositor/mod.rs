//! Screen-space image compositor.
//!
//! Draws a single raster image as an alpha-blended quad, positioned in pixel
//! coordinates, on top of a frame the host has already rendered.

mod config;
mod screen_space;

pub mod shaders;

pub use config::CompositorConfig;
pub use screen_space::ScreenSpaceCompositor;
