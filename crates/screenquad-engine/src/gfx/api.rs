use crate::bitmap::SourceImage;

use super::types::{
    ApiError, ApiLimits, AttribLocation, BindState, BlendFunc, ProgramHandle, ShaderHandle,
    ShaderStage, TextureHandle, TextureSampling, UniformLocation,
};

/// Immediate-mode graphics context, passed explicitly to every compositor call.
///
/// Semantics follow a GL ES 2 style API:
/// - object creation returns `None` where GL would return 0
/// - calls never fail directly; failures are queued and read back one at a
///   time with [`take_error`](GraphicsApi::take_error)
/// - texture operations act on the texture bound to unit 0
///
/// All calls must happen on the thread that owns the underlying context.
pub trait GraphicsApi {
    fn limits(&self) -> ApiLimits;

    // ── shaders ───────────────────────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderHandle>;

    /// Sets the source and compiles. Success is only known through
    /// [`shader_compile_status`](GraphicsApi::shader_compile_status).
    fn compile_shader(&mut self, shader: ShaderHandle, source: &str);

    /// `Err` carries the compiler's info log.
    fn shader_compile_status(&mut self, shader: ShaderHandle) -> Result<(), String>;

    fn delete_shader(&mut self, shader: ShaderHandle);

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self) -> Option<ProgramHandle>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn detach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&mut self, program: ProgramHandle);

    /// `Err` carries the linker's info log.
    fn program_link_status(&mut self, program: ProgramHandle) -> Result<(), String>;

    fn attrib_location(&mut self, program: ProgramHandle, name: &str) -> Option<AttribLocation>;
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// `None` unbinds.
    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn delete_program(&mut self, program: ProgramHandle);

    // ── uniforms (current program) ────────────────────────────────────────

    /// Column-major 4x4 matrix.
    fn uniform_matrix4(&mut self, location: UniformLocation, cols: &[f32; 16]);
    fn uniform_sampler(&mut self, location: UniformLocation, unit: u32);

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> Option<TextureHandle>;

    /// Binds to unit 0. `None` unbinds.
    fn bind_texture(&mut self, texture: Option<TextureHandle>);
    fn set_texture_sampling(&mut self, sampling: &TextureSampling);

    /// Replaces the bound texture's storage with `image`'s pixels.
    ///
    /// The pixels are read during the call only; the caller must keep them
    /// alive and unmodified until it returns, which `SourceImage`'s shared
    /// immutable storage guarantees.
    fn upload_texture(&mut self, image: &SourceImage);
    fn delete_texture(&mut self, texture: TextureHandle);

    // ── fixed-function state + drawing ────────────────────────────────────

    /// `None` disables blending.
    fn set_blend(&mut self, blend: Option<BlendFunc>);
    fn enable_vertex_attrib(&mut self, location: AttribLocation);
    fn disable_vertex_attrib(&mut self, location: AttribLocation);

    /// Two floats per vertex, tightly packed.
    fn vertex_attrib_data(&mut self, location: AttribLocation, data: &[[f32; 2]]);
    fn draw_triangle_strip(&mut self, first: u32, count: u32);

    // ── state + errors ────────────────────────────────────────────────────

    fn bind_state(&self) -> BindState;
    fn restore_bind_state(&mut self, state: BindState);

    /// Pops the oldest pending error, if any.
    fn take_error(&mut self) -> Option<ApiError>;
}
