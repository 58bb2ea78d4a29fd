//! Shader-program collaborator
//!
//! Owns the per-program uniform-block bindings and drives their lazy upload.
//! Each program has independent backing buffers, so a shader switch
//! invalidates every diff baseline: all blocks re-upload in full on the next
//! draw even if the logical values are unchanged.

use crate::context::{GraphicsContext, ShaderId};
use crate::error::GraphicsError;
use crate::uniforms::{
    BLOCK_SLOT_LIGHTS, BLOCK_SLOT_MATERIAL, BLOCK_SLOT_STAGES, BLOCK_SLOT_TRANSFORM, LightsBlock,
    MaterialBlock, TextureStageBlock, TransformBlock, UniformBinding,
};

/// One linked shader program and its uniform-block bindings
#[derive(Debug)]
pub struct ShaderProgram {
    id: ShaderId,
    transform: UniformBinding<TransformBlock>,
    stages: UniformBinding<TextureStageBlock>,
    material: UniformBinding<MaterialBlock>,
    lights: UniformBinding<LightsBlock>,
}

impl ShaderProgram {
    /// Create the program's backing buffers. All blocks start dirty.
    pub fn new<C: GraphicsContext>(id: ShaderId, ctx: &mut C) -> Result<Self, GraphicsError> {
        Ok(Self {
            id,
            transform: UniformBinding::new(ctx)?,
            stages: UniformBinding::new(ctx)?,
            material: UniformBinding::new(ctx)?,
            lights: UniformBinding::new(ctx)?,
        })
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    /// Make this program active and attach its block buffers to the shared
    /// binding slots.
    pub fn bind<C: GraphicsContext>(&self, ctx: &mut C) {
        ctx.use_shader(Some(self.id));
        self.transform.bind(ctx, BLOCK_SLOT_TRANSFORM);
        self.stages.bind(ctx, BLOCK_SLOT_STAGES);
        self.material.bind(ctx, BLOCK_SLOT_MATERIAL);
        self.lights.bind(ctx, BLOCK_SLOT_LIGHTS);
    }

    pub fn set_transform(&mut self, value: &TransformBlock) {
        self.transform.set(value);
    }

    pub fn set_stages(&mut self, value: &TextureStageBlock) {
        self.stages.set(value);
    }

    pub fn set_material(&mut self, value: &MaterialBlock) {
        self.material.set(value);
    }

    pub fn set_lights(&mut self, value: &LightsBlock) {
        self.lights.set(value);
    }

    /// Upload every dirty block and clear the flags.
    pub fn update_uniforms<C: GraphicsContext>(&mut self, ctx: &mut C) {
        self.transform.upload(ctx);
        self.stages.upload(ctx);
        self.material.upload(ctx);
        self.lights.upload(ctx);
    }

    /// Force a full re-upload on the next `update_uniforms`. Used when the
    /// program becomes active after another was bound, since buffer identity
    /// changed even if values did not.
    pub fn mark_all_dirty(&mut self) {
        self.transform.mark_dirty();
        self.stages.mark_dirty();
        self.material.mark_dirty();
        self.lights.mark_dirty();
    }

    /// Full reset on context loss: cached and dirty state alike is stale.
    pub fn invalidate(&mut self) {
        self.mark_all_dirty();
    }

    pub fn any_dirty(&self) -> bool {
        self.transform.is_dirty()
            || self.stages.is_dirty()
            || self.material.is_dirty()
            || self.lights.is_dirty()
    }
}
