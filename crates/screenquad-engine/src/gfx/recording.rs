//! In-memory [`GraphicsApi`] that records every call.
//!
//! Objects are tracked just enough to reproduce GL's observable behavior:
//! fresh non-zero handles, compile/link status, queued errors, bind state.
//! Failures can be injected to exercise error paths without a GPU.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::bitmap::SourceImage;

use super::api::GraphicsApi;
use super::types::{
    ApiError, ApiLimits, AttribLocation, BindState, BlendFunc, ProgramHandle, ShaderHandle,
    ShaderStage, TextureHandle, TextureSampling, UniformLocation,
};

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateShader(ShaderStage),
    CompileShader(ShaderHandle),
    ShaderCompileStatus(ShaderHandle),
    DeleteShader(ShaderHandle),
    CreateProgram,
    AttachShader(ProgramHandle, ShaderHandle),
    DetachShader(ProgramHandle, ShaderHandle),
    LinkProgram(ProgramHandle),
    ProgramLinkStatus(ProgramHandle),
    AttribLocation(ProgramHandle, String),
    UniformLocation(ProgramHandle, String),
    UseProgram(Option<ProgramHandle>),
    DeleteProgram(ProgramHandle),
    UniformMatrix4(UniformLocation, [f32; 16]),
    UniformSampler(UniformLocation, u32),
    CreateTexture,
    BindTexture(Option<TextureHandle>),
    SetTextureSampling(TextureSampling),
    UploadTexture { width: u32, height: u32, generation: u64 },
    DeleteTexture(TextureHandle),
    SetBlend(Option<BlendFunc>),
    EnableVertexAttrib(AttribLocation),
    DisableVertexAttrib(AttribLocation),
    VertexAttribData(AttribLocation, Vec<[f32; 2]>),
    DrawTriangleStrip { first: u32, count: u32 },
    RestoreBindState(BindState),
    TakeError,
}

#[derive(Debug)]
struct ShaderRecord {
    stage: ShaderStage,
    compiled: Option<Result<(), String>>,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    attached: Vec<ShaderHandle>,
    linked: Option<Result<(), String>>,
    attribs: HashMap<String, AttribLocation>,
    uniforms: HashMap<String, UniformLocation>,
}

/// Call-recording fake graphics context.
#[derive(Debug)]
pub struct RecordingApi {
    calls: Vec<Call>,
    next_handle: u32,
    limits: ApiLimits,

    shaders: HashMap<ShaderHandle, ShaderRecord>,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    textures: HashSet<TextureHandle>,
    enabled_attribs: BTreeSet<u32>,
    state: BindState,
    errors: VecDeque<ApiError>,

    // injected failures
    fail_compile: Option<ShaderStage>,
    fail_link: bool,
    missing_names: HashSet<String>,
    refuse_creation: bool,
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_handle: 1,
            limits: ApiLimits {
                max_vertex_attribs: 16,
                max_texture_dimension: 4096,
            },
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashSet::new(),
            enabled_attribs: BTreeSet::new(),
            state: BindState::default(),
            errors: VecDeque::new(),
            fail_compile: None,
            fail_link: false,
            missing_names: HashSet::new(),
            refuse_creation: false,
        }
    }
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    // ── failure injection ─────────────────────────────────────────────────

    /// Shaders of `stage` report a failed compile.
    pub fn fail_compile(mut self, stage: ShaderStage) -> Self {
        self.fail_compile = Some(stage);
        self
    }

    /// Every link reports failure.
    pub fn fail_link(mut self) -> Self {
        self.fail_link = true;
        self
    }

    /// Location queries for `name` return `None`.
    pub fn without_location(mut self, name: &str) -> Self {
        self.missing_names.insert(name.to_owned());
        self
    }

    pub fn with_limits(mut self, limits: ApiLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Object creation returns `None`, like a GL context that has gone away.
    pub fn set_refuse_creation(&mut self, refuse: bool) {
        self.refuse_creation = refuse;
    }

    /// Queues an error to be returned by `take_error`.
    pub fn push_error(&mut self, err: ApiError) {
        self.errors.push_back(err);
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn pending_errors(&self) -> usize {
        self.errors.len()
    }

    /// `(shaders, programs, textures)` currently alive.
    pub fn live_objects(&self) -> (usize, usize, usize) {
        (self.shaders.len(), self.programs.len(), self.textures.len())
    }

    pub fn enabled_attribs(&self) -> Vec<u32> {
        self.enabled_attribs.iter().copied().collect()
    }

    pub fn current_state(&self) -> BindState {
        self.state
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn alloc(&mut self) -> Option<u32> {
        if self.refuse_creation {
            return None;
        }
        let id = self.next_handle;
        self.next_handle += 1;
        Some(id)
    }

    fn error(&mut self, err: ApiError) {
        self.errors.push_back(err);
    }

    fn program_mut(&mut self, program: ProgramHandle) -> Option<&mut ProgramRecord> {
        let found = self.programs.get_mut(&program);
        if found.is_none() {
            self.errors.push_back(ApiError::InvalidValue);
        }
        found
    }

    fn linked_program(&self, program: ProgramHandle) -> bool {
        matches!(
            self.programs.get(&program).and_then(|p| p.linked.as_ref()),
            Some(Ok(()))
        )
    }
}

impl GraphicsApi for RecordingApi {
    fn limits(&self) -> ApiLimits {
        self.limits
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderHandle> {
        self.calls.push(Call::CreateShader(stage));
        let handle = ShaderHandle::new(self.alloc()?)?;
        self.shaders.insert(handle, ShaderRecord { stage, compiled: None });
        Some(handle)
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) {
        self.calls.push(Call::CompileShader(shader));
        let fail_stage = self.fail_compile;
        let Some(record) = self.shaders.get_mut(&shader) else {
            self.error(ApiError::InvalidValue);
            return;
        };
        record.compiled = Some(if fail_stage == Some(record.stage) {
            Err(format!("{:?}: injected compile failure", record.stage))
        } else if source.trim().is_empty() {
            Err("empty shader source".to_owned())
        } else {
            Ok(())
        });
    }

    fn shader_compile_status(&mut self, shader: ShaderHandle) -> Result<(), String> {
        self.calls.push(Call::ShaderCompileStatus(shader));
        match self.shaders.get(&shader) {
            Some(ShaderRecord { compiled: Some(status), .. }) => status.clone(),
            Some(_) => Err("shader was never compiled".to_owned()),
            None => {
                self.error(ApiError::InvalidValue);
                Err("unknown shader".to_owned())
            }
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.calls.push(Call::DeleteShader(shader));
        if self.shaders.remove(&shader).is_none() {
            self.error(ApiError::InvalidValue);
        }
    }

    fn create_program(&mut self) -> Option<ProgramHandle> {
        self.calls.push(Call::CreateProgram);
        let handle = ProgramHandle::new(self.alloc()?)?;
        self.programs.insert(handle, ProgramRecord::default());
        Some(handle)
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.calls.push(Call::AttachShader(program, shader));
        if let Some(p) = self.program_mut(program) {
            p.attached.push(shader);
        }
    }

    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle) {
        self.calls.push(Call::DetachShader(program, shader));
        let Some(p) = self.program_mut(program) else { return };
        let before = p.attached.len();
        p.attached.retain(|s| *s != shader);
        if p.attached.len() == before {
            self.error(ApiError::InvalidOperation);
        }
    }

    fn link_program(&mut self, program: ProgramHandle) {
        self.calls.push(Call::LinkProgram(program));
        let fail_link = self.fail_link;
        let Some(p) = self.programs.get(&program) else {
            self.error(ApiError::InvalidValue);
            return;
        };

        let mut stages = Vec::new();
        let mut all_compiled = true;
        for s in &p.attached {
            match self.shaders.get(s) {
                Some(rec) => {
                    stages.push(rec.stage);
                    all_compiled &= matches!(rec.compiled, Some(Ok(())));
                }
                None => all_compiled = false,
            }
        }

        let status = if fail_link {
            Err("injected link failure".to_owned())
        } else if !all_compiled {
            Err("attached shader is not compiled".to_owned())
        } else if !(stages.contains(&ShaderStage::Vertex)
            && stages.contains(&ShaderStage::Fragment))
        {
            Err("program needs a vertex and a fragment shader".to_owned())
        } else {
            Ok(())
        };

        if let Some(p) = self.programs.get_mut(&program) {
            p.linked = Some(status);
        }
    }

    fn program_link_status(&mut self, program: ProgramHandle) -> Result<(), String> {
        self.calls.push(Call::ProgramLinkStatus(program));
        match self.programs.get(&program).map(|p| p.linked.clone()) {
            Some(Some(status)) => status,
            Some(None) => Err("program was never linked".to_owned()),
            None => {
                self.error(ApiError::InvalidValue);
                Err("unknown program".to_owned())
            }
        }
    }

    fn attrib_location(&mut self, program: ProgramHandle, name: &str) -> Option<AttribLocation> {
        self.calls.push(Call::AttribLocation(program, name.to_owned()));
        if self.missing_names.contains(name) || !self.linked_program(program) {
            return None;
        }
        let p = self.programs.get_mut(&program)?;
        let next = p.attribs.len() as u32;
        Some(*p.attribs.entry(name.to_owned()).or_insert(AttribLocation(next)))
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.calls.push(Call::UniformLocation(program, name.to_owned()));
        if self.missing_names.contains(name) || !self.linked_program(program) {
            return None;
        }
        let p = self.programs.get_mut(&program)?;
        let next = p.uniforms.len() as u32;
        Some(*p.uniforms.entry(name.to_owned()).or_insert(UniformLocation(next)))
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.calls.push(Call::UseProgram(program));
        match program {
            Some(p) if !self.linked_program(p) => self.error(ApiError::InvalidOperation),
            _ => self.state.program = program,
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.calls.push(Call::DeleteProgram(program));
        if self.programs.remove(&program).is_none() {
            self.error(ApiError::InvalidValue);
        }
        if self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, cols: &[f32; 16]) {
        self.calls.push(Call::UniformMatrix4(location, *cols));
        if self.state.program.is_none() {
            self.error(ApiError::InvalidOperation);
        }
    }

    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        self.calls.push(Call::UniformSampler(location, unit));
        if self.state.program.is_none() {
            self.error(ApiError::InvalidOperation);
        }
    }

    fn create_texture(&mut self) -> Option<TextureHandle> {
        self.calls.push(Call::CreateTexture);
        let handle = TextureHandle::new(self.alloc()?)?;
        self.textures.insert(handle);
        Some(handle)
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.calls.push(Call::BindTexture(texture));
        match texture {
            Some(t) if !self.textures.contains(&t) => self.error(ApiError::InvalidValue),
            _ => self.state.texture = texture,
        }
    }

    fn set_texture_sampling(&mut self, sampling: &TextureSampling) {
        self.calls.push(Call::SetTextureSampling(*sampling));
        if self.state.texture.is_none() {
            self.error(ApiError::InvalidOperation);
        }
    }

    fn upload_texture(&mut self, image: &SourceImage) {
        self.calls.push(Call::UploadTexture {
            width: image.width(),
            height: image.height(),
            generation: image.generation(),
        });
        if self.state.texture.is_none() {
            self.error(ApiError::InvalidOperation);
        } else if image.width().max(image.height()) > self.limits.max_texture_dimension {
            self.error(ApiError::InvalidValue);
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.calls.push(Call::DeleteTexture(texture));
        self.textures.remove(&texture);
        if self.state.texture == Some(texture) {
            self.state.texture = None;
        }
    }

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.calls.push(Call::SetBlend(blend));
        self.state.blend = blend;
    }

    fn enable_vertex_attrib(&mut self, location: AttribLocation) {
        self.calls.push(Call::EnableVertexAttrib(location));
        if location.0 >= self.limits.max_vertex_attribs {
            self.error(ApiError::InvalidValue);
            return;
        }
        self.enabled_attribs.insert(location.0);
    }

    fn disable_vertex_attrib(&mut self, location: AttribLocation) {
        self.calls.push(Call::DisableVertexAttrib(location));
        self.enabled_attribs.remove(&location.0);
    }

    fn vertex_attrib_data(&mut self, location: AttribLocation, data: &[[f32; 2]]) {
        self.calls.push(Call::VertexAttribData(location, data.to_vec()));
    }

    fn draw_triangle_strip(&mut self, first: u32, count: u32) {
        self.calls.push(Call::DrawTriangleStrip { first, count });
        if self.state.program.is_none() {
            self.error(ApiError::InvalidOperation);
        }
    }

    fn bind_state(&self) -> BindState {
        // `&self` cannot record; snapshots are observable through RestoreBindState.
        self.state
    }

    fn restore_bind_state(&mut self, state: BindState) {
        self.calls.push(Call::RestoreBindState(state));
        self.state = state;
    }

    fn take_error(&mut self) -> Option<ApiError> {
        self.calls.push(Call::TakeError);
        self.errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(api: &mut RecordingApi, stage: ShaderStage) -> ShaderHandle {
        let s = api.create_shader(stage).unwrap();
        api.compile_shader(s, "void main() {}");
        s
    }

    fn linked(api: &mut RecordingApi) -> ProgramHandle {
        let vs = compiled(api, ShaderStage::Vertex);
        let fs = compiled(api, ShaderStage::Fragment);
        let p = api.create_program().unwrap();
        api.attach_shader(p, vs);
        api.attach_shader(p, fs);
        api.link_program(p);
        p
    }

    #[test]
    fn handles_are_fresh_and_non_zero() {
        let mut api = RecordingApi::new();
        let a = api.create_texture().unwrap();
        let b = api.create_texture().unwrap();
        assert_ne!(a, b);
        assert!(a.get() > 0 && b.get() > 0);
    }

    #[test]
    fn link_requires_both_stages() {
        let mut api = RecordingApi::new();
        let vs = compiled(&mut api, ShaderStage::Vertex);
        let p = api.create_program().unwrap();
        api.attach_shader(p, vs);
        api.link_program(p);
        assert!(api.program_link_status(p).is_err());
    }

    #[test]
    fn injected_compile_failure_only_hits_its_stage() {
        let mut api = RecordingApi::new().fail_compile(ShaderStage::Fragment);
        let vs = compiled(&mut api, ShaderStage::Vertex);
        let fs = compiled(&mut api, ShaderStage::Fragment);
        assert!(api.shader_compile_status(vs).is_ok());
        assert!(api.shader_compile_status(fs).is_err());
    }

    #[test]
    fn locations_are_stable_per_name() {
        let mut api = RecordingApi::new();
        let p = linked(&mut api);
        let a = api.attrib_location(p, "a").unwrap();
        let b = api.attrib_location(p, "b").unwrap();
        assert_ne!(a, b);
        assert_eq!(api.attrib_location(p, "a"), Some(a));
    }

    #[test]
    fn draw_without_program_queues_error() {
        let mut api = RecordingApi::new();
        api.draw_triangle_strip(0, 4);
        assert_eq!(api.take_error(), Some(ApiError::InvalidOperation));
        assert_eq!(api.take_error(), None);
    }

    #[test]
    fn refused_creation_returns_none() {
        let mut api = RecordingApi::new();
        api.set_refuse_creation(true);
        assert!(api.create_program().is_none());
        assert_eq!(api.live_objects(), (0, 0, 0));
    }

    #[test]
    fn deleting_bound_texture_unbinds_it() {
        let mut api = RecordingApi::new();
        let t = api.create_texture().unwrap();
        api.bind_texture(Some(t));
        api.delete_texture(t);
        assert_eq!(api.current_state().texture, None);
    }
}
