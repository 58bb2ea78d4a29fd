//! Uniform parameter blocks and dirty tracking
//!
//! Plain value structs uploaded as whole blocks, never per-field. Each block
//! is `#[repr(C)]`, Pod, and std140-compatible (vec4-aligned fields, 16-byte
//! array strides). `UniformBinding` pairs a block value with its backing
//! buffer and a dirty flag: assignment compares field-by-field and marks the
//! block dirty only on inequality; upload is block-granular and clears the
//! flag.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::context::{GraphicsContext, UniformBufferId};
use crate::error::GraphicsError;

/// Number of texture units visible to shaders
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Number of light slots in the light array
pub const MAX_LIGHTS: usize = 4;

/// Render flag bits carried in `TransformBlock::flags`
pub const FLAG_LIGHTING: u32 = 1 << 0;
pub const FLAG_FOG: u32 = 1 << 1;

/// Uniform-block binding slots, shared by every shader program
pub const BLOCK_SLOT_TRANSFORM: u32 = 0;
pub const BLOCK_SLOT_STAGES: u32 = 1;
pub const BLOCK_SLOT_MATERIAL: u32 = 2;
pub const BLOCK_SLOT_LIGHTS: u32 = 3;

/// Transform matrices + render flags (144 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TransformBlock {
    pub projection: Mat4,
    pub modelview: Mat4,
    /// FLAG_* bits
    pub flags: u32,
    pub _pad: [u32; 3],
}

impl Default for TransformBlock {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
            flags: 0,
            _pad: [0; 3],
        }
    }
}

impl TransformBlock {
    pub fn lighting_enabled(&self) -> bool {
        self.flags & FLAG_LIGHTING != 0
    }
}

/// Per-unit texture stage settings (16 bytes, std140 array stride)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TextureStage {
    /// Non-zero when the unit participates in shading. A disabled unit is
    /// always treated as unbound, whatever texture id it last cached.
    pub enabled: u32,
    /// Sampler uniform index the shader reads this unit through
    pub sampler_slot: i32,
    /// Non-zero when the stage's UV transform applies
    pub uv_transform: u32,
    pub _pad: u32,
}

/// All texture stages as one block (64 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TextureStageBlock {
    pub stages: [TextureStage; MAX_TEXTURE_UNITS],
}

impl TextureStageBlock {
    /// Enable a unit and point its sampler slot at the unit index.
    pub fn enable(&mut self, unit: usize) {
        if let Some(stage) = self.stages.get_mut(unit) {
            stage.enabled = 1;
            stage.sampler_slot = unit as i32;
        }
    }

    pub fn disable(&mut self, unit: usize) {
        if let Some(stage) = self.stages.get_mut(unit) {
            stage.enabled = 0;
        }
    }

    pub fn is_enabled(&self, unit: usize) -> bool {
        self.stages.get(unit).is_some_and(|s| s.enabled != 0)
    }
}

/// Material parameters (80 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialBlock {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emissive: Vec4,
    pub shininess: f32,
    pub _pad: [f32; 3],
}

impl Default for MaterialBlock {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::ZERO,
            emissive: Vec4::ZERO,
            shininess: 0.0,
            _pad: [0.0; 3],
        }
    }
}

/// One light (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Light {
    /// w = 0 for directional, w = 1 for positional
    pub position: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
}

/// Light array + global ambient (224 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightsBlock {
    pub lights: [Light; MAX_LIGHTS],
    pub ambient: Vec4,
    /// Number of active entries in `lights`
    pub count: u32,
    pub _pad: [u32; 3],
}

impl Default for LightsBlock {
    fn default() -> Self {
        Self {
            lights: [Light::default(); MAX_LIGHTS],
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            count: 0,
            _pad: [0; 3],
        }
    }
}

/// A uniform block value paired with its backing buffer and dirty flag.
///
/// The flag is block-granular: any field inequality on assignment dirties
/// the whole block, and upload rewrites the whole block.
#[derive(Debug)]
pub struct UniformBinding<T> {
    value: T,
    buffer: Option<UniformBufferId>,
    dirty: bool,
}

impl<T: Pod + PartialEq + Default> UniformBinding<T> {
    /// Binding with a freshly created backing buffer; starts dirty so the
    /// first upload writes the defaults.
    pub fn new<C: GraphicsContext>(ctx: &mut C) -> Result<Self, GraphicsError> {
        let buffer = ctx.create_uniform_buffer(std::mem::size_of::<T>())?;
        Ok(Self {
            value: T::default(),
            buffer: Some(buffer),
            dirty: true,
        })
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn buffer(&self) -> Option<UniformBufferId> {
        self.buffer
    }

    /// Compare-assign: replaces the stored value and marks the block dirty
    /// only when the new value differs.
    pub fn set(&mut self, value: &T) {
        if self.value != *value {
            self.value = *value;
            self.dirty = true;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Bind the backing buffer to its block slot.
    pub fn bind<C: GraphicsContext>(&self, ctx: &mut C, slot: u32) {
        if let Some(buffer) = self.buffer {
            ctx.bind_uniform_buffer(slot, buffer);
        }
    }

    /// Upload the whole block if dirty, then clear the flag.
    pub fn upload<C: GraphicsContext>(&mut self, ctx: &mut C) {
        if !self.dirty {
            return;
        }
        if let Some(buffer) = self.buffer {
            ctx.upload_uniform_block(buffer, bytemuck::bytes_of(&self.value));
        }
        self.dirty = false;
    }
}
