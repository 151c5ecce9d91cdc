use crate::device::Gpu;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    /// Drop the current device and build a new one (device lost).
    RecreateGpu,
    Exit,
}

/// Host-side lifecycle contract driven by the window runtime.
///
/// Every GPU-owning callback runs on the event-loop thread.
pub trait App {
    /// A device exists: the first resume, or a rebuild after context loss.
    fn on_gpu_ready(&mut self, gpu: &Gpu<'_>) -> AppControl {
        let _ = gpu;
        AppControl::Continue
    }

    /// Called once per redraw.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// The device is gone, along with every object created on it.
    fn on_context_lost(&mut self) {}

    /// The event loop is exiting. The device, if any, is still alive.
    fn on_exit(&mut self, gpu: Option<&Gpu<'_>>) {
        let _ = gpu;
    }
}
