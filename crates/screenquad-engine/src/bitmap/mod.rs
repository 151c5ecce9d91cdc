//! Source raster images.
//!
//! Pixels are decoded once into RGBA8 and shared behind an `Arc`; the
//! compositor references them and never copies or mutates them.

mod source;

pub use source::SourceImage;
