//! Per-texture sampler state
//!
//! Wrap, filter and mipmap settings for one texture. Carries the equivalence
//! check and the dual apply contract: full application when no previous
//! state is given, diff application otherwise.

use crate::context::GraphicsContext;

/// Texture coordinate wrap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum WrapMode {
    #[default]
    Repeat = 0,
    ClampToEdge = 1,
    MirroredRepeat = 2,
}

impl WrapMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => WrapMode::Repeat,
            1 => WrapMode::ClampToEdge,
            2 => WrapMode::MirroredRepeat,
            _ => WrapMode::Repeat,
        }
    }

    pub fn to_glow(self) -> u32 {
        match self {
            WrapMode::Repeat => glow::REPEAT,
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        }
    }
}

/// Texture filter mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FilterMode {
    /// Nearest neighbor (pixelated)
    #[default]
    Nearest = 0,
    /// Linear interpolation (smooth)
    Linear = 1,
}

impl FilterMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => FilterMode::Nearest,
            1 => FilterMode::Linear,
            _ => FilterMode::Nearest,
        }
    }

    /// Magnification filter constant
    pub fn to_glow(self) -> u32 {
        match self {
            FilterMode::Nearest => glow::NEAREST,
            FilterMode::Linear => glow::LINEAR,
        }
    }

    /// Minification filter constant, folding in mipmap selection
    pub fn to_glow_min(self, mipmap: bool) -> u32 {
        match (self, mipmap) {
            (FilterMode::Nearest, false) => glow::NEAREST,
            (FilterMode::Linear, false) => glow::LINEAR,
            (FilterMode::Nearest, true) => glow::NEAREST_MIPMAP_NEAREST,
            (FilterMode::Linear, true) => glow::LINEAR_MIPMAP_LINEAR,
        }
    }
}

/// Sampler settings for one texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmap: bool,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            mipmap: false,
        }
    }
}

impl SamplerState {
    /// No GPU calls are needed to move between equivalent samplers.
    pub fn equivalent(&self, other: &Self) -> bool {
        self == other
    }

    /// Emit sampler parameter calls for the texture bound on the active
    /// unit. Full application when `previous` is `None`, diff otherwise.
    pub fn apply<C: GraphicsContext>(&self, ctx: &mut C, previous: Option<&Self>) {
        if previous.is_none_or(|p| p.wrap_s != self.wrap_s) {
            ctx.set_sampler_wrap_s(self.wrap_s);
        }
        if previous.is_none_or(|p| p.wrap_t != self.wrap_t) {
            ctx.set_sampler_wrap_t(self.wrap_t);
        }
        if previous.is_none_or(|p| p.min_filter != self.min_filter || p.mipmap != self.mipmap) {
            ctx.set_sampler_min_filter(self.min_filter, self.mipmap);
        }
        if previous.is_none_or(|p| p.mag_filter != self.mag_filter) {
            ctx.set_sampler_mag_filter(self.mag_filter);
        }
    }
}
