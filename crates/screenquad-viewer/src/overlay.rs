use screenquad_engine::core::{App, AppControl, FrameCtx};
use screenquad_engine::device::Gpu;
use screenquad_engine::gfx::wgpu_api::WgpuResources;
use screenquad_engine::{CompositorConfig, ScreenSpaceCompositor, SourceImage, Viewport};

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.09,
    g: 0.10,
    b: 0.12,
    a: 1.0,
};

/// Host side of the compositor lifecycle.
///
/// Keeps one compositor across device rebuilds so context loss goes through
/// `context_lost` + `initialize`, and rebuilds it when the window's viewport
/// changes.
pub struct Overlay {
    image: SourceImage,
    config: CompositorConfig,
    compositor: Option<ScreenSpaceCompositor>,
    resources: Option<WgpuResources>,
}

impl Overlay {
    pub fn new(image: SourceImage, config: CompositorConfig) -> Self {
        Self {
            image,
            config,
            compositor: None,
            resources: None,
        }
    }

    /// Ensures a compositor for `viewport` exists and is initialized on the
    /// current device.
    fn prepare(&mut self, gpu: &Gpu<'_>, viewport: Viewport) -> AppControl {
        let Some(resources) = self.resources.as_mut() else {
            return AppControl::RecreateGpu;
        };
        let ctx = gpu.render_ctx();

        if let Some(old) = self.compositor.as_mut().filter(|c| c.viewport() != viewport) {
            log::debug!(
                "viewport changed to {}x{}; rebuilding compositor",
                viewport.width(),
                viewport.height()
            );
            old.deinitialize(&mut resources.detached(&ctx));
            self.compositor = None;
        }

        let compositor = self.compositor.get_or_insert_with(|| {
            ScreenSpaceCompositor::new(viewport, self.image.clone(), self.config)
        });

        match compositor.initialize(&mut resources.detached(&ctx)) {
            Ok(()) => AppControl::Continue,
            Err(e) => {
                log::error!("compositor initialization failed: {e}");
                AppControl::Exit
            }
        }
    }
}

impl App for Overlay {
    fn on_gpu_ready(&mut self, gpu: &Gpu<'_>) -> AppControl {
        self.resources = Some(WgpuResources::new(gpu.device()));
        match gpu.viewport() {
            Ok(viewport) => self.prepare(gpu, viewport),
            // Minimized; the first real frame initializes.
            Err(_) => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.resources.as_ref().is_none_or(WgpuResources::is_context_lost) {
            return AppControl::RecreateGpu;
        }
        let Ok(viewport) = ctx.gpu.viewport() else {
            return AppControl::Continue;
        };

        let control = self.prepare(ctx.gpu, viewport);
        if control != AppControl::Continue {
            return control;
        }

        let (Some(compositor), Some(resources)) =
            (self.compositor.as_mut(), self.resources.as_mut())
        else {
            return AppControl::Continue;
        };
        ctx.render(BACKGROUND, |rctx, target| {
            compositor.render(&mut resources.frame(rctx, target));
        })
    }

    fn on_context_lost(&mut self) {
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.context_lost();
        }
        self.resources = None;
    }

    fn on_exit(&mut self, gpu: Option<&Gpu<'_>>) {
        let (Some(gpu), Some(resources), Some(compositor)) =
            (gpu, self.resources.as_mut(), self.compositor.as_mut())
        else {
            return;
        };
        compositor.deinitialize(&mut resources.detached(&gpu.render_ctx()));
        log::info!(
            "exiting after {} texture upload(s)",
            compositor.texture_uploads()
        );
    }
}
