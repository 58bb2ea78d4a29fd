//! Global render state
//!
//! The non-texture, non-shader part of a GPU state snapshot: depth, blend,
//! cull, line/point, clear color and viewport. Value-typed, with the same
//! equivalence + dual apply-mode contract as `SamplerState`.

use crate::context::GraphicsContext;

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DepthFunc {
    Never = 0,
    Less = 1,
    Equal = 2,
    #[default]
    LessEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterEqual = 6,
    Always = 7,
}

impl DepthFunc {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => DepthFunc::Never,
            1 => DepthFunc::Less,
            2 => DepthFunc::Equal,
            3 => DepthFunc::LessEqual,
            4 => DepthFunc::Greater,
            5 => DepthFunc::NotEqual,
            6 => DepthFunc::GreaterEqual,
            7 => DepthFunc::Always,
            _ => DepthFunc::LessEqual,
        }
    }

    pub fn to_glow(self) -> u32 {
        match self {
            DepthFunc::Never => glow::NEVER,
            DepthFunc::Less => glow::LESS,
            DepthFunc::Equal => glow::EQUAL,
            DepthFunc::LessEqual => glow::LEQUAL,
            DepthFunc::Greater => glow::GREATER,
            DepthFunc::NotEqual => glow::NOTEQUAL,
            DepthFunc::GreaterEqual => glow::GEQUAL,
            DepthFunc::Always => glow::ALWAYS,
        }
    }
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum BlendEquation {
    #[default]
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}

impl BlendEquation {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => BlendEquation::Add,
            1 => BlendEquation::Subtract,
            2 => BlendEquation::ReverseSubtract,
            3 => BlendEquation::Min,
            4 => BlendEquation::Max,
            _ => BlendEquation::Add,
        }
    }

    pub fn to_glow(self) -> u32 {
        match self {
            BlendEquation::Add => glow::FUNC_ADD,
            BlendEquation::Subtract => glow::FUNC_SUBTRACT,
            BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
            BlendEquation::Min => glow::MIN,
            BlendEquation::Max => glow::MAX,
        }
    }
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum BlendFactor {
    Zero = 0,
    #[default]
    One = 1,
    SrcColor = 2,
    OneMinusSrcColor = 3,
    DstColor = 4,
    OneMinusDstColor = 5,
    SrcAlpha = 6,
    OneMinusSrcAlpha = 7,
    DstAlpha = 8,
    OneMinusDstAlpha = 9,
}

impl BlendFactor {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => BlendFactor::Zero,
            1 => BlendFactor::One,
            2 => BlendFactor::SrcColor,
            3 => BlendFactor::OneMinusSrcColor,
            4 => BlendFactor::DstColor,
            5 => BlendFactor::OneMinusDstColor,
            6 => BlendFactor::SrcAlpha,
            7 => BlendFactor::OneMinusSrcAlpha,
            8 => BlendFactor::DstAlpha,
            9 => BlendFactor::OneMinusDstAlpha,
            _ => BlendFactor::One,
        }
    }

    pub fn to_glow(self) -> u32 {
        match self {
            BlendFactor::Zero => glow::ZERO,
            BlendFactor::One => glow::ONE,
            BlendFactor::SrcColor => glow::SRC_COLOR,
            BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
            BlendFactor::DstColor => glow::DST_COLOR,
            BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
            BlendFactor::SrcAlpha => glow::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstAlpha => glow::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
        }
    }
}

/// Separate RGB/alpha blend factors, set as one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFactors {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl Default for BlendFactors {
    fn default() -> Self {
        Self {
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }
}

impl BlendFactors {
    /// Standard alpha blending
    pub const ALPHA: BlendFactors = BlendFactors {
        src_rgb: BlendFactor::SrcAlpha,
        dst_rgb: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
    };

    /// Additive blending
    pub const ADDITIVE: BlendFactors = BlendFactors {
        src_rgb: BlendFactor::SrcAlpha,
        dst_rgb: BlendFactor::One,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::One,
    };
}

/// Cull mode for face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum CullMode {
    /// No face culling
    #[default]
    None = 0,
    /// Cull back faces
    Back = 1,
    /// Cull front faces
    Front = 2,
}

impl CullMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => CullMode::None,
            1 => CullMode::Back,
            2 => CullMode::Front,
            _ => CullMode::None,
        }
    }

    pub fn to_glow(self) -> Option<u32> {
        match self {
            CullMode::None => None,
            CullMode::Back => Some(glow::BACK),
            CullMode::Front => Some(glow::FRONT),
        }
    }
}

/// Viewport rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// Snapshot of all global (non-texture, non-shader) GPU state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalState {
    pub depth_write: bool,
    pub depth_func: DepthFunc,
    pub depth_range: (f32, f32),
    pub blend_equation: BlendEquation,
    pub blend_factors: BlendFactors,
    pub cull_mode: CullMode,
    pub line_width: f32,
    pub line_smooth: bool,
    pub point_smooth: bool,
    pub point_size: f32,
    pub clear_color: [f32; 4],
    pub viewport: Viewport,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            depth_write: true,
            depth_func: DepthFunc::LessEqual,
            depth_range: (0.0, 1.0),
            blend_equation: BlendEquation::Add,
            blend_factors: BlendFactors::default(),
            cull_mode: CullMode::None,
            line_width: 1.0,
            line_smooth: false,
            point_smooth: false,
            point_size: 1.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            viewport: Viewport::default(),
        }
    }
}

impl GlobalState {
    /// No GPU calls are needed to move between equivalent states.
    pub fn equivalent(&self, other: &Self) -> bool {
        self == other
    }

    /// Emit state calls in reconciliation order: depth write, depth func,
    /// depth range, blend equation, blend factors, cull, line width,
    /// line/point smoothing, point size, clear color, viewport.
    /// Full application when `previous` is `None`, diff otherwise.
    pub fn apply<C: GraphicsContext>(&self, ctx: &mut C, previous: Option<&Self>) {
        if previous.is_none_or(|p| p.depth_write != self.depth_write) {
            ctx.set_depth_write(self.depth_write);
        }
        if previous.is_none_or(|p| p.depth_func != self.depth_func) {
            ctx.set_depth_func(self.depth_func);
        }
        if previous.is_none_or(|p| p.depth_range != self.depth_range) {
            ctx.set_depth_range(self.depth_range.0, self.depth_range.1);
        }
        if previous.is_none_or(|p| p.blend_equation != self.blend_equation) {
            ctx.set_blend_equation(self.blend_equation);
        }
        if previous.is_none_or(|p| p.blend_factors != self.blend_factors) {
            ctx.set_blend_factors(self.blend_factors);
        }
        if previous.is_none_or(|p| p.cull_mode != self.cull_mode) {
            ctx.set_cull_mode(self.cull_mode);
        }
        if previous.is_none_or(|p| p.line_width != self.line_width) {
            ctx.set_line_width(self.line_width);
        }
        if previous.is_none_or(|p| p.line_smooth != self.line_smooth) {
            ctx.set_line_smooth(self.line_smooth);
        }
        if previous.is_none_or(|p| p.point_smooth != self.point_smooth) {
            ctx.set_point_smooth(self.point_smooth);
        }
        if previous.is_none_or(|p| p.point_size != self.point_size) {
            ctx.set_point_size(self.point_size);
        }
        if previous.is_none_or(|p| p.clear_color != self.clear_color) {
            ctx.set_clear_color(self.clear_color);
        }
        if previous.is_none_or(|p| p.viewport != self.viewport) {
            ctx.set_viewport(self.viewport);
        }
    }
}
