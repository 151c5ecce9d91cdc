use crate::bitmap::SourceImage;
use crate::coords::{ScreenTransform, Viewport};
use crate::error::CompositorError;
use crate::gfx::{
    ApiError, AttribLocation, GraphicsApi, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, UniformLocation,
};
use crate::layout::{GeometryBuffers, VERTEX_COUNT};

use super::config::CompositorConfig;
use super::shaders;

/// Resolved attribute and uniform slots of the linked program.
#[derive(Debug, Copy, Clone)]
struct Locations {
    screen: UniformLocation,
    position: AttribLocation,
    tex_coord: AttribLocation,
    texture: UniformLocation,
}

/// Objects owned while initialized. All become invalid on context loss.
#[derive(Debug, Copy, Clone)]
struct GpuObjects {
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    program: ProgramHandle,
    locations: Locations,
    texture: Option<TextureHandle>,
}

/// Draws one image as a screen-aligned quad over whatever is already in the
/// framebuffer.
///
/// The compositor holds no graphics context of its own: every call that
/// touches the GPU takes the host's [`GraphicsApi`] by `&mut`, and must be
/// made on the thread that owns it.
///
/// Lifecycle:
/// - [`initialize`](Self::initialize) once a context exists
/// - [`render`](Self::render) per redraw
/// - [`context_lost`](Self::context_lost) when the context was destroyed
///   behind the compositor's back, then `initialize` again
/// - [`deinitialize`](Self::deinitialize) on orderly teardown
pub struct ScreenSpaceCompositor {
    viewport: Viewport,
    image: SourceImage,
    config: CompositorConfig,

    transform: ScreenTransform,
    geometry: GeometryBuffers,

    gpu: Option<GpuObjects>,
    texture_dirty: bool,
    texture_uploads: u64,
    oversize_warned: bool,
}

impl ScreenSpaceCompositor {
    pub fn new(viewport: Viewport, image: SourceImage, config: CompositorConfig) -> Self {
        let transform = ScreenTransform::from_viewport(viewport);
        let geometry = GeometryBuffers::compute(viewport, image.size(), &config.layout);
        Self {
            viewport,
            image,
            config,
            transform,
            geometry,
            gpu: None,
            texture_dirty: true,
            texture_uploads: 0,
            oversize_warned: false,
        }
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Compiles and links the program and resolves its locations.
    ///
    /// On failure nothing created here survives and the compositor stays
    /// uninitialized. Calling this while initialized does nothing.
    pub fn initialize(&mut self, api: &mut impl GraphicsApi) -> Result<(), CompositorError> {
        if self.gpu.is_some() {
            return Ok(());
        }

        let limits = api.limits();
        log::debug!(
            "initializing screen-space compositor: viewport {}x{}, image {}x{}, \
             max attribs {}, max texture {}",
            self.viewport.width(),
            self.viewport.height(),
            self.image.width(),
            self.image.height(),
            limits.max_vertex_attribs,
            limits.max_texture_dimension,
        );

        let strict = self.config.strict_mode;
        let vertex = compile_stage(api, ShaderStage::Vertex, shaders::VERTEX_SHADER, strict)?;
        let fragment =
            match compile_stage(api, ShaderStage::Fragment, shaders::FRAGMENT_SHADER, strict) {
                Ok(f) => f,
                Err(e) => {
                    api.delete_shader(vertex);
                    return Err(e);
                }
            };

        let Some(program) = api.create_program() else {
            api.delete_shader(vertex);
            api.delete_shader(fragment);
            return Err(CompositorError::ProgramLink {
                log: "could not create a program object".into(),
            });
        };
        api.attach_shader(program, vertex);
        api.attach_shader(program, fragment);
        api.link_program(program);

        let locations = api
            .program_link_status(program)
            .map_err(|log| CompositorError::ProgramLink { log })
            .and_then(|()| resolve_locations(api, program));

        let locations = match locations {
            Ok(l) => l,
            Err(e) => {
                release_program(api, program, vertex, fragment);
                return Err(e);
            }
        };

        if strict {
            drain_errors(api, "initialize");
        }

        self.gpu = Some(GpuObjects {
            vertex,
            fragment,
            program,
            locations,
            texture: None,
        });
        self.texture_dirty = true;
        log::debug!("screen-space compositor initialized ({program})");
        Ok(())
    }

    /// Draws the image quad. Does nothing, and makes no API calls, while
    /// uninitialized.
    ///
    /// Bind state (program, texture, blend) is restored afterwards. API errors
    /// never escape: in strict mode they are logged, otherwise ignored.
    pub fn render(&mut self, api: &mut impl GraphicsApi) {
        let Some(gpu) = self.gpu else { return };

        let max = api.limits().max_texture_dimension;
        if self.image.width().max(self.image.height()) > max {
            if !self.oversize_warned {
                log::warn!(
                    "image {}x{} exceeds the max texture dimension {max}; not drawing it",
                    self.image.width(),
                    self.image.height(),
                );
                self.oversize_warned = true;
            }
            return;
        }

        let strict = self.config.strict_mode;
        let loc = gpu.locations;
        let saved = api.bind_state();

        api.use_program(Some(gpu.program));
        api.uniform_matrix4(loc.screen, self.transform.as_cols());
        if strict {
            drain_errors(api, "program");
        }

        let texture = if self.texture_dirty {
            self.upload(api)
        } else {
            gpu.texture
        };
        let Some(texture) = texture else {
            api.restore_bind_state(saved);
            return;
        };
        api.bind_texture(Some(texture));
        api.uniform_sampler(loc.texture, 0);
        if strict {
            drain_errors(api, "texture");
        }

        api.set_blend(Some(self.config.blend));
        api.enable_vertex_attrib(loc.position);
        api.vertex_attrib_data(loc.position, self.geometry.positions());
        api.enable_vertex_attrib(loc.tex_coord);
        api.vertex_attrib_data(loc.tex_coord, self.geometry.tex_coords());
        if strict {
            drain_errors(api, "vertex attributes");
        }

        api.draw_triangle_strip(0, VERTEX_COUNT);
        api.disable_vertex_attrib(loc.position);
        api.disable_vertex_attrib(loc.tex_coord);
        api.restore_bind_state(saved);
        if strict {
            drain_errors(api, "draw");
        }
    }

    /// Forgets every GPU handle without touching the API.
    ///
    /// The host must only call this once its context is already gone, which
    /// takes the compositor's objects with it.
    pub fn context_lost(&mut self) {
        if self.gpu.take().is_some() {
            log::warn!("graphics context lost; screen-space compositor handles dropped");
        }
        self.texture_dirty = true;
    }

    /// Releases every object created by [`initialize`](Self::initialize) and
    /// [`render`](Self::render). Safe to call repeatedly.
    pub fn deinitialize(&mut self, api: &mut impl GraphicsApi) {
        let Some(gpu) = self.gpu.take() else { return };

        api.disable_vertex_attrib(gpu.locations.position);
        if let Some(texture) = gpu.texture {
            api.delete_texture(texture);
        }
        release_program(api, gpu.program, gpu.vertex, gpu.fragment);
        self.texture_dirty = true;
        log::debug!("screen-space compositor deinitialized");
    }

    /// Swaps in another image.
    ///
    /// The texture is re-uploaded at the next render only when `image` is not
    /// the one already held (compared by generation).
    pub fn replace_image(&mut self, image: SourceImage) {
        if image.generation() == self.image.generation() {
            return;
        }
        let resized = image.width() != self.image.width() || image.height() != self.image.height();
        self.image = image;
        self.texture_dirty = true;
        self.oversize_warned = false;
        if resized {
            self.geometry =
                GeometryBuffers::compute(self.viewport, self.image.size(), &self.config.layout);
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.gpu.map(|g| g.program)
    }

    pub fn screen_transform(&self) -> &ScreenTransform {
        &self.transform
    }

    pub fn geometry(&self) -> &GeometryBuffers {
        &self.geometry
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn image(&self) -> &SourceImage {
        &self.image
    }

    /// Texture uploads performed since construction.
    pub fn texture_uploads(&self) -> u64 {
        self.texture_uploads
    }

    // ── internals ─────────────────────────────────────────────────────────

    /// Creates the texture if needed and uploads the current image into it.
    fn upload(&mut self, api: &mut impl GraphicsApi) -> Option<TextureHandle> {
        let gpu = self.gpu.as_mut()?;
        let texture = match gpu.texture {
            Some(t) => t,
            None => {
                let Some(t) = api.create_texture() else {
                    log::warn!("could not create a texture object; skipping frame");
                    return None;
                };
                gpu.texture = Some(t);
                t
            }
        };

        api.bind_texture(Some(texture));
        api.set_texture_sampling(&self.config.sampling);
        api.upload_texture(&self.image);

        self.texture_dirty = false;
        self.texture_uploads += 1;
        log::trace!(
            "uploaded image generation {} ({}x{})",
            self.image.generation(),
            self.image.width(),
            self.image.height()
        );
        Some(texture)
    }
}

fn compile_stage(
    api: &mut impl GraphicsApi,
    stage: ShaderStage,
    source: &str,
    strict: bool,
) -> Result<ShaderHandle, CompositorError> {
    let shader = api.create_shader(stage).ok_or_else(|| CompositorError::ShaderCompile {
        stage,
        log: "could not create a shader object".into(),
    })?;
    api.compile_shader(shader, source);

    if strict {
        if let Err(log) = api.shader_compile_status(shader) {
            api.delete_shader(shader);
            return Err(CompositorError::ShaderCompile { stage, log });
        }
    }
    Ok(shader)
}

fn resolve_locations(
    api: &mut impl GraphicsApi,
    program: ProgramHandle,
) -> Result<Locations, CompositorError> {
    fn missing(name: &str) -> CompositorError {
        CompositorError::ProgramLink {
            log: format!("linked program has no active `{name}`"),
        }
    }

    let position = api
        .attrib_location(program, shaders::POSITION)
        .ok_or_else(|| missing(shaders::POSITION))?;
    let tex_coord = api
        .attrib_location(program, shaders::TEX_COORD)
        .ok_or_else(|| missing(shaders::TEX_COORD))?;
    let screen = api
        .uniform_location(program, shaders::SCREEN_MATRIX)
        .ok_or_else(|| missing(shaders::SCREEN_MATRIX))?;
    let texture = api
        .uniform_location(program, shaders::TEXTURE)
        .ok_or_else(|| missing(shaders::TEXTURE))?;

    Ok(Locations {
        screen,
        position,
        tex_coord,
        texture,
    })
}

fn release_program(
    api: &mut impl GraphicsApi,
    program: ProgramHandle,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
) {
    api.detach_shader(program, vertex);
    api.detach_shader(program, fragment);
    api.delete_shader(vertex);
    api.delete_shader(fragment);
    api.delete_program(program);
}

/// Logs every pending API error. A lost context keeps reporting itself, so
/// draining stops there.
fn drain_errors(api: &mut impl GraphicsApi, stage: &str) {
    while let Some(err) = api.take_error() {
        log::warn!("screen-space compositor: {err} during {stage}");
        if err == ApiError::ContextLost {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::{Call, RecordingApi};
    use crate::gfx::{ApiLimits, BindState, BlendFunc};

    fn image(w: u32, h: u32) -> SourceImage {
        SourceImage::from_rgba(w, h, vec![255; (w * h * 4) as usize]).unwrap()
    }

    fn compositor(strict: bool) -> ScreenSpaceCompositor {
        ScreenSpaceCompositor::new(
            Viewport::new(1000, 2000).unwrap(),
            image(100, 100),
            CompositorConfig::default().with_strict_mode(strict),
        )
    }

    fn ready(strict: bool) -> (ScreenSpaceCompositor, RecordingApi) {
        let mut api = RecordingApi::new();
        let mut c = compositor(strict);
        c.initialize(&mut api).unwrap();
        api.clear_calls();
        (c, api)
    }

    fn uploads(api: &RecordingApi) -> usize {
        api.count(|c| matches!(c, Call::UploadTexture { .. }))
    }

    #[test]
    fn render_before_initialize_makes_no_calls() {
        let mut api = RecordingApi::new();
        let mut c = compositor(true);
        c.render(&mut api);
        assert_eq!(api.call_count(), 0);
        assert_eq!(c.texture_uploads(), 0);
    }

    #[test]
    fn initialize_builds_program_and_is_idempotent() {
        let mut api = RecordingApi::new();
        let mut c = compositor(true);
        c.initialize(&mut api).unwrap();
        assert!(c.is_initialized());
        assert!(c.program().is_some());
        assert_eq!(api.live_objects(), (2, 1, 0));

        api.clear_calls();
        c.initialize(&mut api).unwrap();
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn render_draws_one_strip_and_cleans_up() {
        let (mut c, mut api) = ready(true);
        c.render(&mut api);

        assert_eq!(
            api.count(|c| *c == Call::DrawTriangleStrip { first: 0, count: 4 }),
            1
        );
        assert!(api.enabled_attribs().is_empty());
        assert_eq!(api.current_state(), BindState::default());
        assert_eq!(api.pending_errors(), 0);
        assert_eq!(api.live_objects(), (2, 1, 1));
    }

    #[test]
    fn uploads_positions_and_matrix_for_tall_viewport() {
        let (mut c, mut api) = ready(true);
        c.render(&mut api);

        let positions = api.calls().iter().find_map(|call| match call {
            Call::VertexAttribData(AttribLocation(0), data) => Some(data.clone()),
            _ => None,
        });
        let positions = positions.unwrap();
        assert_eq!(positions[0], [0.0, 1900.0]);
        assert_eq!(positions[3], [100.0, 2000.0]);

        let matrix = api.calls().iter().find_map(|call| match call {
            Call::UniformMatrix4(_, cols) => Some(*cols),
            _ => None,
        });
        let m = matrix.unwrap();
        assert_eq!([m[0], m[5], m[10], m[15]], [0.002, -0.001, 0.0, 1.0]);
    }

    #[test]
    fn blend_is_alpha_over_during_draw_and_restored_after() {
        let mut api = RecordingApi::new();
        let mut c = compositor(true);
        c.initialize(&mut api).unwrap();

        let other = api.create_texture().unwrap();
        api.bind_texture(Some(other));
        let before = api.current_state();

        c.render(&mut api);

        assert!(api.calls().contains(&Call::SetBlend(Some(BlendFunc::ALPHA_OVER))));
        assert_eq!(api.calls().last(), Some(&Call::TakeError));
        assert!(api.calls().contains(&Call::RestoreBindState(before)));
        assert_eq!(api.current_state(), before);
    }

    #[test]
    fn texture_uploads_only_when_image_changes() {
        let (mut c, mut api) = ready(false);
        c.render(&mut api);
        c.render(&mut api);
        assert_eq!(c.texture_uploads(), 1);
        assert_eq!(uploads(&api), 1);

        let same = c.image().clone();
        c.replace_image(same);
        c.render(&mut api);
        assert_eq!(c.texture_uploads(), 1);

        c.replace_image(image(100, 100));
        c.render(&mut api);
        assert_eq!(c.texture_uploads(), 2);
        assert_eq!(api.count(|c| *c == Call::CreateTexture), 1);
    }

    #[test]
    fn replace_image_with_new_size_recomputes_geometry() {
        let (mut c, mut api) = ready(false);
        c.replace_image(image(50, 20));
        assert_eq!(c.geometry().positions()[0], [0.0, 1980.0]);
        assert_eq!(c.geometry().positions()[3], [50.0, 2000.0]);

        c.render(&mut api);
        assert!(api.calls().contains(&Call::UploadTexture {
            width: 50,
            height: 20,
            generation: c.image().generation(),
        }));
    }

    #[test]
    fn repeated_renders_feed_identical_data() {
        let (mut c, mut api) = ready(false);
        let geometry = *c.geometry();
        let transform = *c.screen_transform();

        c.render(&mut api);
        let first: Vec<Call> = api
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::VertexAttribData(..) | Call::UniformMatrix4(..)))
            .cloned()
            .collect();
        api.clear_calls();

        c.render(&mut api);
        let second: Vec<Call> = api
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::VertexAttribData(..) | Call::UniformMatrix4(..)))
            .cloned()
            .collect();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(*c.geometry(), geometry);
        assert_eq!(*c.screen_transform(), transform);
    }

    #[test]
    fn deinitialize_releases_everything_once() {
        let (mut c, mut api) = ready(true);
        c.render(&mut api);
        c.deinitialize(&mut api);
        assert!(!c.is_initialized());
        assert_eq!(api.live_objects(), (0, 0, 0));
        assert_eq!(api.pending_errors(), 0);

        api.clear_calls();
        c.deinitialize(&mut api);
        c.render(&mut api);
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn context_loss_forgets_handles_without_calls() {
        let (mut c, mut api) = ready(true);
        c.render(&mut api);
        let old = c.program().unwrap();

        api.clear_calls();
        c.context_lost();
        assert_eq!(api.call_count(), 0);
        assert!(!c.is_initialized());

        c.initialize(&mut api).unwrap();
        let new = c.program().unwrap();
        assert_ne!(old, new);

        c.render(&mut api);
        assert_eq!(c.texture_uploads(), 2);
    }

    #[test]
    fn strict_compile_failure_releases_objects() {
        let mut api = RecordingApi::new().fail_compile(ShaderStage::Fragment);
        let mut c = compositor(true);
        let err = c.initialize(&mut api).unwrap_err();
        assert!(matches!(
            err,
            CompositorError::ShaderCompile { stage: ShaderStage::Fragment, .. }
        ));
        assert!(!c.is_initialized());
        assert_eq!(api.live_objects(), (0, 0, 0));
    }

    #[test]
    fn lenient_compile_failure_surfaces_at_link() {
        let mut api = RecordingApi::new().fail_compile(ShaderStage::Vertex);
        let mut c = compositor(false);
        let err = c.initialize(&mut api).unwrap_err();
        assert!(matches!(err, CompositorError::ProgramLink { .. }));
        assert_eq!(api.count(|c| matches!(c, Call::ShaderCompileStatus(_))), 0);
        assert_eq!(api.live_objects(), (0, 0, 0));
    }

    #[test]
    fn link_failure_releases_objects() {
        let mut api = RecordingApi::new().fail_link();
        let mut c = compositor(true);
        assert!(matches!(
            c.initialize(&mut api),
            Err(CompositorError::ProgramLink { .. })
        ));
        assert_eq!(api.live_objects(), (0, 0, 0));
        assert_eq!(api.pending_errors(), 0);
    }

    #[test]
    fn missing_location_is_a_link_failure() {
        let mut api = RecordingApi::new().without_location(shaders::TEXTURE);
        let mut c = compositor(true);
        let err = c.initialize(&mut api).unwrap_err();
        match err {
            CompositorError::ProgramLink { log } => assert!(log.contains(shaders::TEXTURE)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(api.live_objects(), (0, 0, 0));
    }

    #[test]
    fn strict_mode_drains_errors_lenient_leaves_them() {
        let (mut strict, mut api) = ready(true);
        api.push_error(ApiError::OutOfMemory);
        strict.render(&mut api);
        assert_eq!(api.pending_errors(), 0);
        assert!(api.count(|c| *c == Call::TakeError) >= 4);

        let (mut lenient, mut api) = ready(false);
        api.push_error(ApiError::OutOfMemory);
        lenient.render(&mut api);
        assert_eq!(api.pending_errors(), 1);
        assert_eq!(api.count(|c| *c == Call::TakeError), 0);
    }

    #[test]
    fn oversized_image_is_skipped() {
        let mut api = RecordingApi::new().with_limits(ApiLimits {
            max_vertex_attribs: 16,
            max_texture_dimension: 64,
        });
        let mut c = compositor(true);
        c.initialize(&mut api).unwrap();
        api.clear_calls();

        c.render(&mut api);
        c.render(&mut api);
        assert_eq!(api.call_count(), 0);
        assert_eq!(c.texture_uploads(), 0);

        c.replace_image(image(32, 32));
        c.render(&mut api);
        assert_eq!(c.texture_uploads(), 1);
    }

    #[test]
    fn refused_texture_skips_frame_and_restores_state() {
        let (mut c, mut api) = ready(true);
        api.set_refuse_creation(true);
        c.render(&mut api);
        assert_eq!(api.count(|c| matches!(c, Call::DrawTriangleStrip { .. })), 0);
        assert_eq!(api.current_state(), BindState::default());
        assert_eq!(c.texture_uploads(), 0);

        api.set_refuse_creation(false);
        c.render(&mut api);
        assert_eq!(c.texture_uploads(), 1);
    }
}
