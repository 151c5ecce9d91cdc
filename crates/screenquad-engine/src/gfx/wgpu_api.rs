//! [`GraphicsApi`] backed by wgpu.
//!
//! GL-style objects live in [`WgpuResources`], which persists across frames.
//! Each frame the host wraps the resources, its [`RenderCtx`] and its
//! [`RenderTarget`] in a short-lived [`WgpuApi`] and hands that to the
//! compositor. Setup and teardown can run [`detached`](WgpuResources::detached)
//! from any target, like a GL context with no framebuffer bound; draws then
//! fail with `InvalidFramebufferOperation`.
//!
//! Mapping:
//! - shader object   -> `wgpu::ShaderModule` (one WGSL module per stage)
//! - linked program  -> bind group layout + uniform buffer; render pipelines
//!   are built lazily per (blend, target format) and cached
//! - texture object  -> `wgpu::Texture` (Rgba8UnormSrgb) + sampler
//! - vertex attrib   -> one vertex buffer per attribute location
//! - draw            -> a render pass on the target with `LoadOp::Load`
//!
//! Uniform and vertex writes go through `Queue::write_buffer`, so they take
//! effect at the next submit; one draw per program per frame is assumed.
//!
//! Object creation runs inside a validation error scope and lands in the GL
//! error queue (or a shader's compile status). Anything wgpu reports outside a
//! scope, such as pass errors raised when the host finishes its encoder, is
//! caught by the device's uncaptured-error handler and queued the same way.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::bitmap::SourceImage;
use crate::compositor::shaders;
use crate::render::{RenderCtx, RenderTarget};

use super::api::GraphicsApi;
use super::types::{
    ApiError, ApiLimits, AttribLocation, BindState, BlendFactor, BlendFunc, FilterMode,
    ProgramHandle, ShaderHandle, ShaderStage, TextureHandle, TextureSampling, UniformLocation,
    WrapMode,
};

/// Names and slots a linked program exposes.
///
/// WGSL fixes locations and bindings in the source, so the backend is told the
/// mapping up front instead of reflecting it.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    pub attributes: Vec<(&'static str, u32)>,
    pub matrix: (&'static str, u32),
    /// (name, texture binding, sampler binding)
    pub sampler: (&'static str, u32, u32),
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
}

impl Default for ProgramInterface {
    fn default() -> Self {
        Self {
            attributes: vec![
                (shaders::POSITION, shaders::POSITION_LOCATION),
                (shaders::TEX_COORD, shaders::TEX_COORD_LOCATION),
            ],
            matrix: (shaders::SCREEN_MATRIX, shaders::SCREEN_MATRIX_BINDING),
            sampler: (shaders::TEXTURE, shaders::TEXTURE_BINDING, shaders::SAMPLER_BINDING),
            vertex_entry: shaders::VERTEX_ENTRY,
            fragment_entry: shaders::FRAGMENT_ENTRY,
        }
    }
}

struct ShaderEntry {
    stage: ShaderStage,
    module: Option<wgpu::ShaderModule>,
    status: Option<Result<(), String>>,
}

#[derive(Default)]
struct ProgramEntry {
    attached: Vec<ShaderHandle>,
    status: Option<Result<(), String>>,
    linked: Option<LinkedProgram>,
}

struct LinkedProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_buffer: wgpu::Buffer,
    sampler_unit: Option<u32>,
    pipelines: HashMap<(Option<BlendFunc>, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

struct TextureEntry {
    sampling: TextureSampling,
    sampler: Option<wgpu::Sampler>,
    storage: Option<TextureStorage>,
}

struct TextureStorage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

struct AttribBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    vertices: u32,
}

/// GL-style object tables and bind state, kept for the device's lifetime.
///
/// Drop and rebuild this alongside the device when the context is lost.
pub struct WgpuResources {
    interface: ProgramInterface,
    limits: ApiLimits,
    next_handle: u32,

    shaders: HashMap<ShaderHandle, ShaderEntry>,
    programs: HashMap<ProgramHandle, ProgramEntry>,
    textures: HashMap<TextureHandle, TextureEntry>,
    attribs: HashMap<u32, AttribBuffer>,
    enabled_attribs: BTreeSet<u32>,

    state: BindState,
    errors: VecDeque<ApiError>,
    uncaptured: Arc<Mutex<VecDeque<ApiError>>>,
    lost: Arc<AtomicBool>,
}

impl WgpuResources {
    pub fn new(device: &wgpu::Device) -> Self {
        Self::with_interface(device, ProgramInterface::default())
    }

    /// Installs the device-lost callback and the uncaptured-error handler on
    /// `device`, replacing any the host set before.
    pub fn with_interface(device: &wgpu::Device, interface: ProgramInterface) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            if is_unexpected_loss(reason) {
                log::warn!("wgpu device lost ({reason:?}): {message}");
                flag.store(true, Ordering::Release);
            } else {
                log::debug!("wgpu device destroyed: {message}");
            }
        });

        let uncaptured = Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&uncaptured);
        device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
            log::debug!("uncaptured wgpu error: {err}");
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(to_api_error(&err, ApiError::InvalidOperation));
        }));

        let device_limits = device.limits();
        Self {
            interface,
            limits: ApiLimits {
                max_vertex_attribs: device_limits.max_vertex_attributes,
                max_texture_dimension: device_limits.max_texture_dimension_2d,
            },
            next_handle: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            attribs: HashMap::new(),
            enabled_attribs: BTreeSet::new(),
            state: BindState::default(),
            errors: VecDeque::new(),
            uncaptured,
            lost,
        }
    }

    /// True once wgpu reported the device as lost.
    pub fn is_context_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Borrows the resources together with this frame's device and target.
    pub fn frame<'a, 'c, 't>(
        &'a mut self,
        ctx: &'a RenderCtx<'c>,
        target: &'a mut RenderTarget<'t>,
    ) -> WgpuApi<'a, 'c, 't> {
        WgpuApi {
            res: self,
            ctx,
            target: Some(target),
        }
    }

    /// Borrows the resources without a render target.
    pub fn detached<'a, 'c>(&'a mut self, ctx: &'a RenderCtx<'c>) -> WgpuApi<'a, 'c, 'static> {
        WgpuApi {
            res: self,
            ctx,
            target: None,
        }
    }

    fn alloc(&mut self) -> Option<u32> {
        if self.is_context_lost() {
            return None;
        }
        let id = self.next_handle;
        self.next_handle = self.next_handle.checked_add(1)?;
        Some(id)
    }

    fn error(&mut self, err: ApiError) {
        self.errors.push_back(err);
    }

    fn next_error(&mut self) -> Option<ApiError> {
        self.errors.pop_front().or_else(|| {
            self.uncaptured
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
        })
    }
}

/// Runs `f` inside a validation error scope and returns what it caught.
fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    (value, pollster::block_on(scope.pop()))
}

fn to_api_error(err: &wgpu::Error, validation: ApiError) -> ApiError {
    match err {
        wgpu::Error::OutOfMemory { .. } => ApiError::OutOfMemory,
        wgpu::Error::Validation { .. } => validation,
        wgpu::Error::Internal { .. } => ApiError::Other(0),
    }
}

fn is_unexpected_loss(reason: wgpu::DeviceLostReason) -> bool {
    !matches!(reason, wgpu::DeviceLostReason::Destroyed)
}

/// Per-frame [`GraphicsApi`] over [`WgpuResources`].
pub struct WgpuApi<'a, 'c, 't> {
    res: &'a mut WgpuResources,
    ctx: &'a RenderCtx<'c>,
    target: Option<&'a mut RenderTarget<'t>>,
}

impl WgpuApi<'_, '_, '_> {
    fn build_pipeline(
        &self,
        linked: &LinkedProgram,
        blend: Option<BlendFunc>,
    ) -> (wgpu::RenderPipeline, Option<wgpu::Error>) {
        let attrs: Vec<[wgpu::VertexAttribute; 1]> = self
            .res
            .interface
            .attributes
            .iter()
            .map(|&(_, location)| {
                [wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: location,
                }]
            })
            .collect();

        let layouts: Vec<wgpu::VertexBufferLayout<'_>> = attrs
            .iter()
            .map(|a| wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: a,
            })
            .collect();

        let device = self.ctx.device;
        scoped(device, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("screenquad composite pipeline"),
                layout: Some(&linked.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &linked.vertex,
                    entry_point: Some(self.res.interface.vertex_entry),
                    compilation_options: Default::default(),
                    buffers: &layouts,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &linked.fragment,
                    entry_point: Some(self.res.interface.fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.ctx.target_format,
                        blend: blend.map(to_wgpu_blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })
    }

    fn sampler_for(&mut self, texture: TextureHandle) -> Option<wgpu::Sampler> {
        let device = self.ctx.device;
        let entry = self.res.textures.get_mut(&texture)?;
        if entry.sampler.is_none() {
            let s = entry.sampling;
            entry.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("screenquad sampler"),
                address_mode_u: to_wgpu_wrap(s.wrap_s),
                address_mode_v: to_wgpu_wrap(s.wrap_t),
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: to_wgpu_filter(s.mag_filter),
                min_filter: to_wgpu_filter(s.min_filter),
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            }));
        }
        entry.sampler.clone()
    }
}

impl GraphicsApi for WgpuApi<'_, '_, '_> {
    fn limits(&self) -> ApiLimits {
        self.res.limits
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderHandle> {
        let handle = ShaderHandle::new(self.res.alloc()?)?;
        self.res.shaders.insert(
            handle,
            ShaderEntry {
                stage,
                module: None,
                status: None,
            },
        );
        Some(handle)
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) {
        let Some(entry) = self.res.shaders.get(&shader) else {
            self.res.error(ApiError::InvalidValue);
            return;
        };
        let label = match entry.stage {
            ShaderStage::Vertex => "screenquad vertex shader",
            ShaderStage::Fragment => "screenquad fragment shader",
        };

        let device = self.ctx.device;
        let (module, scope_error) = scoped(device, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });

        let info = pollster::block_on(module.get_compilation_info());
        let mut errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| m.message_type == wgpu::CompilationMessageType::Error)
            .map(|m| match &m.location {
                Some(loc) => format!("{}:{}: {}", loc.line_number, loc.line_position, m.message),
                None => m.message.clone(),
            })
            .collect();
        if errors.is_empty() {
            errors.extend(scope_error.map(|e| e.to_string()));
        }

        let status = if errors.is_empty() { Ok(()) } else { Err(errors.join("\n")) };

        if let Some(entry) = self.res.shaders.get_mut(&shader) {
            entry.module = Some(module);
            entry.status = Some(status);
        }
    }

    fn shader_compile_status(&mut self, shader: ShaderHandle) -> Result<(), String> {
        match self.res.shaders.get(&shader) {
            Some(ShaderEntry { status: Some(s), .. }) => s.clone(),
            Some(_) => Err("shader was never compiled".to_owned()),
            None => {
                self.res.error(ApiError::InvalidValue);
                Err("unknown shader".to_owned())
            }
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.res.shaders.remove(&shader).is_none() {
            self.res.error(ApiError::InvalidValue);
        }
    }

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self) -> Option<ProgramHandle> {
        let handle = ProgramHandle::new(self.res.alloc()?)?;
        self.res.programs.insert(handle, ProgramEntry::default());
        Some(handle)
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        if !self.res.shaders.contains_key(&shader) {
            self.res.error(ApiError::InvalidValue);
            return;
        }
        match self.res.programs.get_mut(&program) {
            Some(p) if !p.attached.contains(&shader) => p.attached.push(shader),
            Some(_) => self.res.error(ApiError::InvalidOperation),
            None => self.res.error(ApiError::InvalidValue),
        }
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        let Some(p) = self.res.programs.get_mut(&program) else {
            self.res.error(ApiError::InvalidValue);
            return;
        };
        let before = p.attached.len();
        p.attached.retain(|s| *s != shader);
        if p.attached.len() == before {
            self.res.error(ApiError::InvalidOperation);
        }
    }

    fn link_program(&mut self, program: ProgramHandle) {
        let Some(p) = self.res.programs.get(&program) else {
            self.res.error(ApiError::InvalidValue);
            return;
        };

        let mut vertex = None;
        let mut fragment = None;
        let mut problems = Vec::new();
        for handle in &p.attached {
            let Some(entry) = self.res.shaders.get(handle) else {
                problems.push(format!("{handle} was deleted"));
                continue;
            };
            let module = match (&entry.status, &entry.module) {
                (Some(Ok(())), Some(m)) => m.clone(),
                _ => {
                    problems.push(format!("{handle} is not compiled"));
                    continue;
                }
            };
            match entry.stage {
                ShaderStage::Vertex => vertex = Some(module),
                ShaderStage::Fragment => fragment = Some(module),
            }
        }

        let (status, linked) = match (vertex, fragment) {
            (Some(vertex), Some(fragment)) if problems.is_empty() => {
                match scoped(self.ctx.device, || self.link_modules(vertex, fragment)) {
                    (linked, None) => (Ok(()), Some(linked)),
                    (_, Some(err)) => (Err(err.to_string()), None),
                }
            }
            (v, f) => {
                if v.is_none() {
                    problems.push("no vertex shader attached".to_owned());
                }
                if f.is_none() {
                    problems.push("no fragment shader attached".to_owned());
                }
                (Err(problems.join("; ")), None)
            }
        };

        if let Some(p) = self.res.programs.get_mut(&program) {
            p.status = Some(status);
            p.linked = linked;
        }
    }

    fn program_link_status(&mut self, program: ProgramHandle) -> Result<(), String> {
        match self.res.programs.get(&program) {
            Some(ProgramEntry { status: Some(s), .. }) => s.clone(),
            Some(_) => Err("program was never linked".to_owned()),
            None => {
                self.res.error(ApiError::InvalidValue);
                Err("unknown program".to_owned())
            }
        }
    }

    fn attrib_location(&mut self, program: ProgramHandle, name: &str) -> Option<AttribLocation> {
        self.res.programs.get(&program)?.linked.as_ref()?;
        self.res
            .interface
            .attributes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, loc)| AttribLocation(loc))
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.res.programs.get(&program)?.linked.as_ref()?;
        let iface = &self.res.interface;
        if iface.matrix.0 == name {
            Some(UniformLocation(iface.matrix.1))
        } else if iface.sampler.0 == name {
            Some(UniformLocation(iface.sampler.1))
        } else {
            None
        }
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        match program {
            Some(p) => match self.res.programs.get(&p) {
                Some(entry) if entry.linked.is_some() => self.res.state.program = Some(p),
                Some(_) => self.res.error(ApiError::InvalidOperation),
                None => self.res.error(ApiError::InvalidValue),
            },
            None => self.res.state.program = None,
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.res.programs.remove(&program).is_none() {
            self.res.error(ApiError::InvalidValue);
        }
        if self.res.state.program == Some(program) {
            self.res.state.program = None;
        }
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    fn uniform_matrix4(&mut self, location: UniformLocation, cols: &[f32; 16]) {
        if location.0 != self.res.interface.matrix.1 {
            self.res.error(ApiError::InvalidOperation);
            return;
        }
        let buffer = self
            .res
            .state
            .program
            .and_then(|p| self.res.programs.get(&p))
            .and_then(|e| e.linked.as_ref())
            .map(|l| l.uniform_buffer.clone());
        match buffer {
            Some(b) => self.ctx.queue.write_buffer(&b, 0, bytemuck::cast_slice(cols)),
            None => self.res.error(ApiError::InvalidOperation),
        }
    }

    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        if location.0 != self.res.interface.sampler.1 {
            self.res.error(ApiError::InvalidOperation);
            return;
        }
        if unit != 0 {
            // Only texture unit 0 exists in this backend.
            self.res.error(ApiError::InvalidValue);
            return;
        }
        let linked = self
            .res
            .state
            .program
            .and_then(|p| self.res.programs.get_mut(&p))
            .and_then(|e| e.linked.as_mut());
        match linked {
            Some(l) => l.sampler_unit = Some(unit),
            None => self.res.error(ApiError::InvalidOperation),
        }
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> Option<TextureHandle> {
        let handle = TextureHandle::new(self.res.alloc()?)?;
        self.res.textures.insert(
            handle,
            TextureEntry {
                sampling: TextureSampling::default(),
                sampler: None,
                storage: None,
            },
        );
        Some(handle)
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        match texture {
            Some(t) if !self.res.textures.contains_key(&t) => {
                self.res.error(ApiError::InvalidValue)
            }
            _ => self.res.state.texture = texture,
        }
    }

    fn set_texture_sampling(&mut self, sampling: &TextureSampling) {
        let entry = self
            .res
            .state
            .texture
            .and_then(|t| self.res.textures.get_mut(&t));
        match entry {
            Some(e) => {
                if e.sampling != *sampling {
                    e.sampling = *sampling;
                    e.sampler = None;
                }
            }
            None => self.res.error(ApiError::InvalidOperation),
        }
    }

    fn upload_texture(&mut self, image: &SourceImage) {
        let (w, h) = (image.width(), image.height());
        if w.max(h) > self.res.limits.max_texture_dimension {
            self.res.error(ApiError::InvalidValue);
            return;
        }

        let device = self.ctx.device;
        let entry = self
            .res
            .state
            .texture
            .and_then(|t| self.res.textures.get_mut(&t));
        let Some(entry) = entry else {
            self.res.error(ApiError::InvalidOperation);
            return;
        };

        let queue = self.ctx.queue;
        let (_, scope_error) = scoped(device, || write_image(device, queue, entry, image));
        if let Some(err) = scope_error {
            log::debug!("texture upload failed: {err}");
            self.res.error(to_api_error(&err, ApiError::InvalidValue));
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        match self.res.textures.remove(&texture) {
            Some(entry) => {
                if let Some(storage) = entry.storage {
                    storage.texture.destroy();
                }
            }
            None => self.res.error(ApiError::InvalidValue),
        }
        if self.res.state.texture == Some(texture) {
            self.res.state.texture = None;
        }
    }

    // ── state + drawing ───────────────────────────────────────────────────

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.res.state.blend = blend;
    }

    fn enable_vertex_attrib(&mut self, location: AttribLocation) {
        if location.0 >= self.res.limits.max_vertex_attribs {
            self.res.error(ApiError::InvalidValue);
            return;
        }
        self.res.enabled_attribs.insert(location.0);
    }

    fn disable_vertex_attrib(&mut self, location: AttribLocation) {
        self.res.enabled_attribs.remove(&location.0);
    }

    fn vertex_attrib_data(&mut self, location: AttribLocation, data: &[[f32; 2]]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = bytes.len() as u64;
        let device = self.ctx.device;

        let slot = self.res.attribs.get(&location.0);
        if slot.is_none_or(|s| s.capacity < needed) {
            let capacity = needed.next_power_of_two().max(64);
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("screenquad attribute vbo"),
                size: capacity,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.res.attribs.insert(
                location.0,
                AttribBuffer {
                    buffer,
                    capacity,
                    vertices: 0,
                },
            );
        }

        if let Some(slot) = self.res.attribs.get_mut(&location.0) {
            self.ctx.queue.write_buffer(&slot.buffer, 0, bytes);
            slot.vertices = data.len() as u32;
        }
    }

    fn draw_triangle_strip(&mut self, first: u32, count: u32) {
        if count == 0 {
            return;
        }
        let end = first.saturating_add(count);
        if self.target.is_none() {
            self.res.error(ApiError::InvalidFramebufferOperation);
            return;
        }

        let Some(program) = self.res.state.program else {
            self.res.error(ApiError::InvalidOperation);
            return;
        };
        let Some(texture) = self.res.state.texture else {
            self.res.error(ApiError::InvalidOperation);
            return;
        };
        let Some(view) = self
            .res
            .textures
            .get(&texture)
            .and_then(|t| t.storage.as_ref())
            .map(|s| s.view.clone())
        else {
            self.res.error(ApiError::InvalidOperation);
            return;
        };

        // Every attribute the program consumes must be enabled and fed.
        let mut vertex_buffers = Vec::with_capacity(self.res.interface.attributes.len());
        let mut unfed = None;
        for &(name, location) in &self.res.interface.attributes {
            let fed = self
                .res
                .attribs
                .get(&location)
                .filter(|a| self.res.enabled_attribs.contains(&location) && a.vertices >= end);
            match fed {
                Some(a) => vertex_buffers.push(a.buffer.clone()),
                None => {
                    unfed = Some(name);
                    break;
                }
            }
        }
        if let Some(name) = unfed {
            log::trace!("draw skipped: attribute {name} not enabled or short");
            self.res.error(ApiError::InvalidOperation);
            return;
        }

        let Some(sampler) = self.sampler_for(texture) else {
            self.res.error(ApiError::InvalidOperation);
            return;
        };

        let blend = self.res.state.blend;
        let format = self.ctx.target_format;
        let cached = self
            .res
            .programs
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .map(|l| (l.pipelines.get(&(blend, format)).cloned(), l.sampler_unit));
        let Some((cached_pipeline, sampler_unit)) = cached else {
            self.res.error(ApiError::InvalidOperation);
            return;
        };
        if sampler_unit.is_none() {
            log::trace!("sampler uniform never set; defaulting to unit 0");
        }

        let pipeline = match cached_pipeline {
            Some(p) => p,
            None => {
                let linked = self.res.programs.get(&program).and_then(|p| p.linked.as_ref());
                let built = match linked.map(|l| self.build_pipeline(l, blend)) {
                    Some((pipeline, None)) => pipeline,
                    Some((_, Some(err))) => {
                        log::debug!("pipeline creation failed: {err}");
                        self.res.error(to_api_error(&err, ApiError::InvalidOperation));
                        return;
                    }
                    None => return,
                };
                if let Some(l) = self
                    .res
                    .programs
                    .get_mut(&program)
                    .and_then(|p| p.linked.as_mut())
                {
                    l.pipelines.insert((blend, format), built.clone());
                }
                built
            }
        };

        let Some((layout, uniforms)) = self
            .res
            .programs
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .map(|l| (l.bind_group_layout.clone(), l.uniform_buffer.clone()))
        else {
            return;
        };

        let (_, texture_binding, sampler_binding) = self.res.interface.sampler;
        let matrix_binding = self.res.interface.matrix.1;
        let device = self.ctx.device;
        let (bind_group, scope_error) = scoped(device, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("screenquad bind group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: matrix_binding,
                        resource: uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: texture_binding,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: sampler_binding,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            })
        });
        if let Some(err) = scope_error {
            log::debug!("bind group creation failed: {err}");
            self.res.error(to_api_error(&err, ApiError::InvalidOperation));
            return;
        }

        let Some(target) = self.target.as_mut() else { return };
        let color_view = target.color_view;
        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("screenquad composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        for (slot, buffer) in vertex_buffers.iter().enumerate() {
            rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        rpass.draw(first..end, 0..1);
    }

    fn bind_state(&self) -> BindState {
        self.res.state
    }

    fn restore_bind_state(&mut self, state: BindState) {
        self.res.state = state;
    }

    fn take_error(&mut self) -> Option<ApiError> {
        if self.res.is_context_lost() {
            return Some(ApiError::ContextLost);
        }
        self.res.next_error()
    }
}

impl WgpuApi<'_, '_, '_> {
    fn link_modules(
        &self,
        vertex: wgpu::ShaderModule,
        fragment: wgpu::ShaderModule,
    ) -> LinkedProgram {
        let device = self.ctx.device;
        let iface = &self.res.interface;
        let (_, texture_binding, sampler_binding) = iface.sampler;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screenquad bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: iface.matrix.1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(MATRIX_BYTES),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: texture_binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: sampler_binding,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("screenquad pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("screenquad matrix ubo"),
            size: MATRIX_BYTES,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        LinkedProgram {
            vertex,
            fragment,
            bind_group_layout,
            pipeline_layout,
            uniform_buffer,
            sampler_unit: None,
            pipelines: HashMap::new(),
        }
    }
}

/// Reallocates `entry`'s texture when the image size changed, then queues the
/// pixel upload.
fn write_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    entry: &mut TextureEntry,
    image: &SourceImage,
) {
    let (w, h) = (image.width(), image.height());
    if entry.storage.as_ref().map(|s| s.size) != Some((w, h)) {
        if let Some(old) = entry.storage.take() {
            old.texture.destroy();
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("screenquad image"),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        entry.storage = Some(TextureStorage {
            texture,
            view,
            size: (w, h),
        });
    }

    let Some(storage) = entry.storage.as_ref() else {
        return;
    };
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &storage.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.pixels(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * w),
            rows_per_image: Some(h),
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
}

const MATRIX_BYTES: u64 = (16 * std::mem::size_of::<f32>()) as u64;

fn to_wgpu_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn to_wgpu_blend(func: BlendFunc) -> wgpu::BlendState {
    // GL's glBlendFunc applies one factor pair to color and alpha alike.
    let component = wgpu::BlendComponent {
        src_factor: to_wgpu_factor(func.src),
        dst_factor: to_wgpu_factor(func.dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

fn to_wgpu_filter(f: FilterMode) -> wgpu::FilterMode {
    match f {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn to_wgpu_wrap(w: WrapMode) -> wgpu::AddressMode {
    match w {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_over_maps_to_both_components() {
        let b = to_wgpu_blend(BlendFunc::ALPHA_OVER);
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(b.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(b.alpha, b.color);
    }

    #[test]
    fn default_sampling_maps_to_clamped_nearest_linear() {
        let s = TextureSampling::default();
        assert_eq!(to_wgpu_filter(s.min_filter), wgpu::FilterMode::Nearest);
        assert_eq!(to_wgpu_filter(s.mag_filter), wgpu::FilterMode::Linear);
        assert_eq!(to_wgpu_wrap(s.wrap_s), wgpu::AddressMode::ClampToEdge);
    }

    #[test]
    fn default_interface_matches_shader_constants() {
        let iface = ProgramInterface::default();
        assert_eq!(iface.attributes[0], (shaders::POSITION, 0));
        assert_eq!(iface.attributes[1], (shaders::TEX_COORD, 1));
        assert!(shaders::VERTEX_SHADER.contains("@location(0) a_position"));
        assert!(shaders::FRAGMENT_SHADER.contains("@binding(1) var u_texture"));
    }

    #[test]
    fn only_unrequested_loss_counts_as_context_loss() {
        assert!(!is_unexpected_loss(wgpu::DeviceLostReason::Destroyed));
        assert!(is_unexpected_loss(wgpu::DeviceLostReason::Unknown));
    }

    #[test]
    fn wgpu_errors_map_onto_gl_codes() {
        let validation = wgpu::Error::Validation {
            source: "bad binding".into(),
            description: "bad binding".to_owned(),
        };
        let oom = wgpu::Error::OutOfMemory {
            source: "heap".into(),
        };
        assert_eq!(to_api_error(&validation, ApiError::InvalidValue), ApiError::InvalidValue);
        assert_eq!(to_api_error(&oom, ApiError::InvalidValue), ApiError::OutOfMemory);
    }

    /// A device on whatever adapter the machine offers, or `None` on hosts
    /// without one, in which case the GPU tests return early.
    fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            let limits =
                wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("screenquad test device"),
                    required_limits: limits,
                    ..Default::default()
                })
                .await
                .ok()
        })
    }

    #[test]
    fn invalid_wgsl_fails_compile_status() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no adapter; skipping");
            return;
        };
        let ctx = RenderCtx::new(&device, &queue, wgpu::TextureFormat::Rgba8UnormSrgb);
        let mut res = WgpuResources::new(&device);
        let mut api = res.detached(&ctx);

        let shader = api.create_shader(ShaderStage::Vertex).unwrap();
        api.compile_shader(shader, "this is not wgsl");
        assert!(api.shader_compile_status(shader).is_err());

        // The failed shader cannot be linked, and nothing panicked on the way.
        let fragment = api.create_shader(ShaderStage::Fragment).unwrap();
        api.compile_shader(fragment, shaders::FRAGMENT_SHADER);
        assert_eq!(api.shader_compile_status(fragment), Ok(()));
        let program = api.create_program().unwrap();
        api.attach_shader(program, shader);
        api.attach_shader(program, fragment);
        api.link_program(program);
        assert!(api.program_link_status(program).is_err());
        assert_eq!(api.take_error(), None);
    }

    #[test]
    fn shipped_shaders_link_and_detached_draw_reports_framebuffer_error() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no adapter; skipping");
            return;
        };
        let ctx = RenderCtx::new(&device, &queue, wgpu::TextureFormat::Rgba8UnormSrgb);
        let mut res = WgpuResources::new(&device);
        let mut api = res.detached(&ctx);

        let vertex = api.create_shader(ShaderStage::Vertex).unwrap();
        api.compile_shader(vertex, shaders::VERTEX_SHADER);
        let fragment = api.create_shader(ShaderStage::Fragment).unwrap();
        api.compile_shader(fragment, shaders::FRAGMENT_SHADER);
        let program = api.create_program().unwrap();
        api.attach_shader(program, vertex);
        api.attach_shader(program, fragment);
        api.link_program(program);
        assert_eq!(api.program_link_status(program), Ok(()));

        api.use_program(Some(program));
        api.draw_triangle_strip(0, 4);
        assert_eq!(api.take_error(), Some(ApiError::InvalidFramebufferOperation));
        assert_eq!(api.take_error(), None);
    }
}
