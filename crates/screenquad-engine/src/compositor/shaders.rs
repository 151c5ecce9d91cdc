//! WGSL sources for the compositor program and the names it resolves.
//!
//! Binding layout (group 0):
//! - binding 0: `u_screen` pixel-to-clip matrix (vertex)
//! - binding 1: `u_texture` image (fragment)
//! - binding 2: sampler paired with `u_texture` (fragment)

pub const SCREEN_MATRIX: &str = "u_screen";
pub const POSITION: &str = "a_position";
pub const TEX_COORD: &str = "a_tex_coord";
pub const TEXTURE: &str = "u_texture";

pub const POSITION_LOCATION: u32 = 0;
pub const TEX_COORD_LOCATION: u32 = 1;

pub const SCREEN_MATRIX_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub const VERTEX_SHADER: &str = r#"
struct Screen {
    matrix: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> u_screen: Screen;

struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) a_position: vec2<f32>,
    @location(1) a_tex_coord: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    out.position = u_screen.matrix * vec4<f32>(a_position, 0.0, 1.0);
    out.tex_coord = a_tex_coord;
    return out;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
@group(0) @binding(1) var u_texture: texture_2d<f32>;
@group(0) @binding(2) var u_sampler: sampler;

@fragment
fn fs_main(@location(0) tex_coord: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(u_texture, u_sampler, tex_coord);
}
"#;
