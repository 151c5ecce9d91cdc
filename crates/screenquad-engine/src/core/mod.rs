//! Contract between the window runtime and the application it drives.
//!
//! The runtime owns the platform loop and the device; the application only
//! sees lifecycle callbacks and a per-frame context.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
