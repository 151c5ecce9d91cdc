use std::fmt;
use std::num::NonZeroU32;

// ── handles ───────────────────────────────────────────────────────────────

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Returns `None` for the reserved zero handle.
            #[inline]
            pub const fn new(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }

            #[inline]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Compiled (or failed) shader object.
    ShaderHandle
);
handle!(
    /// Program object; linked executable once `link_program` succeeds.
    ProgramHandle
);
handle!(
    /// 2D texture object.
    TextureHandle
);

/// Vertex attribute slot resolved from a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

/// Uniform slot resolved from a linked program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

// ── pipeline enums ────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Source/destination factors of an additive blend equation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Straight (non-premultiplied) alpha over.
    pub const ALPHA_OVER: BlendFunc = BlendFunc {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::ALPHA_OVER
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Sampler state attached to a texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureSampling {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl Default for TextureSampling {
    /// Nearest minification, linear magnification, clamped on both axes so
    /// the quad border never samples the opposite edge.
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
        }
    }
}

// ── state + errors ────────────────────────────────────────────────────────

/// Bindings a draw mutates; captured before and restored after compositing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BindState {
    pub program: Option<ProgramHandle>,
    pub texture: Option<TextureHandle>,
    /// `None` = blending disabled.
    pub blend: Option<BlendFunc>,
}

/// Per-call error reported by the API, one at a time, via `take_error`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
    ContextLost,
    Other(u32),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidEnum => f.write_str("invalid enum"),
            ApiError::InvalidValue => f.write_str("invalid value"),
            ApiError::InvalidOperation => f.write_str("invalid operation"),
            ApiError::InvalidFramebufferOperation => f.write_str("invalid framebuffer operation"),
            ApiError::OutOfMemory => f.write_str("out of memory"),
            ApiError::ContextLost => f.write_str("context lost"),
            ApiError::Other(code) => write!(f, "error code {code:#x}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApiLimits {
    pub max_vertex_attribs: u32,
    pub max_texture_dimension: u32,
}
