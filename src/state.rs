//! Logical GPU state and reconciliation
//!
//! `LogicalGPUState` is an immutable-by-value snapshot of everything that
//! affects rendered output for subsequent draws. Callers produce desired
//! snapshots; the renderer holds exactly one "current" instance, replaced
//! wholesale on each state-set call.
//!
//! `reconcile` is the single entry point for both apply modes: full
//! application when `previous` is `None` (first application, context loss)
//! and diff application otherwise, emitting only the calls needed to move
//! the GPU from `previous` to `self`.

use smallvec::SmallVec;

use crate::context::{GraphicsContext, ShaderId, TextureId};
use crate::global_state::GlobalState;
use crate::sampler::SamplerState;
use crate::shader::ShaderProgram;
use crate::uniforms::{
    LightsBlock, MAX_TEXTURE_UNITS, MaterialBlock, TextureStageBlock, TransformBlock,
};

/// One texture unit's binding: bound texture id + sampler params
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextureUnit {
    /// `TextureId::INVALID` means unbound
    pub bound: TextureId,
    pub sampler: SamplerState,
}

/// Value snapshot of all GPU-visible state
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalGPUState {
    pub global: GlobalState,
    /// Per-unit bindings, keyed by unit index; missing entries are unbound.
    /// Dynamically sized but bounds-checked against `MAX_TEXTURE_UNITS`.
    pub units: SmallVec<[TextureUnit; MAX_TEXTURE_UNITS]>,
    /// Active shader identity; `None` means no program bound
    pub shader: Option<ShaderId>,
    pub transform: TransformBlock,
    pub stages: TextureStageBlock,
    pub material: MaterialBlock,
    pub lights: LightsBlock,
}

impl Default for LogicalGPUState {
    fn default() -> Self {
        Self {
            global: GlobalState::default(),
            units: SmallVec::new(),
            shader: None,
            transform: TransformBlock::default(),
            stages: TextureStageBlock::default(),
            material: MaterialBlock::default(),
            lights: LightsBlock::default(),
        }
    }
}

impl LogicalGPUState {
    /// The unit's binding, defaulting to unbound for units never set.
    pub fn unit(&self, index: usize) -> TextureUnit {
        self.units.get(index).copied().unwrap_or_default()
    }

    /// Set a unit's binding. Out-of-range indices are ignored.
    pub fn set_unit(&mut self, index: usize, unit: TextureUnit) {
        if index >= MAX_TEXTURE_UNITS {
            return;
        }
        if self.units.len() <= index {
            self.units.resize(index + 1, TextureUnit::default());
        }
        self.units[index] = unit;
    }

    /// Bind a texture on a unit and enable its stage in one step.
    pub fn bind_texture(&mut self, index: usize, texture: TextureId, sampler: SamplerState) {
        self.set_unit(index, TextureUnit { bound: texture, sampler });
        self.stages.enable(index);
    }

    /// Whether the unit's stage-enable uniform flag is set.
    pub fn unit_enabled(&self, index: usize) -> bool {
        self.stages.is_enabled(index)
    }

    /// Whether the unit contributes binding calls: enabled and holding a
    /// valid texture id. A disabled unit is always treated as unbound, so a
    /// stale cached id on it is harmless and never triggers a rebind.
    fn unit_active(&self, index: usize) -> bool {
        self.unit_enabled(index) && self.unit(index).bound != TextureId::INVALID
    }

    /// Clear every unit bound to `texture` back to unbound. Called when the
    /// texture is deleted so reconciliation can never rebind a freed handle.
    pub fn clear_texture(&mut self, texture: TextureId) {
        for unit in self.units.iter_mut() {
            if unit.bound == texture {
                unit.bound = TextureId::INVALID;
            }
        }
    }

    /// Fuzzy equivalence: true iff no GPU calls are required to move
    /// between the two states. Units disabled in both states are ignored
    /// even if their cached bound ids differ; light values only matter when
    /// lighting is enabled.
    pub fn equivalent(&self, other: &Self) -> bool {
        if self.global != other.global {
            return false;
        }
        if self.shader != other.shader {
            return false;
        }
        if self.transform != other.transform
            || self.stages != other.stages
            || self.material != other.material
        {
            return false;
        }
        let lighting = self.transform.lighting_enabled() || other.transform.lighting_enabled();
        if lighting && self.lights != other.lights {
            return false;
        }
        for index in 0..MAX_TEXTURE_UNITS {
            if !self.unit_enabled(index) && !other.unit_enabled(index) {
                continue;
            }
            let a = self.unit(index);
            let b = other.unit(index);
            if a.bound != b.bound || !a.sampler.equivalent(&b.sampler) {
                return false;
            }
        }
        true
    }

    /// Emit the underlying calls that move the GPU to this state.
    ///
    /// `program` is the registered program for `self.shader`, or `None` when
    /// no shader is set or the id is unregistered (treated as inactive).
    /// Order: global state, texture units (activate / bind-if-differs /
    /// sampler diffs), shader bind, dirty uniform blocks.
    pub fn reconcile<C: GraphicsContext>(
        &self,
        ctx: &mut C,
        program: Option<&mut ShaderProgram>,
        previous: Option<&Self>,
    ) {
        self.global.apply(ctx, previous.map(|p| &p.global));

        for index in 0..MAX_TEXTURE_UNITS {
            if !self.unit_active(index) {
                continue;
            }
            let unit = self.unit(index);
            let prev_unit = previous.and_then(|p| p.unit_active(index).then(|| p.unit(index)));

            let bind_needed = prev_unit.is_none_or(|p| p.bound != unit.bound);
            let prev_sampler = prev_unit.map(|p| p.sampler);
            let sampler_needed =
                prev_sampler.is_none_or(|s| !unit.sampler.equivalent(&s));
            if !bind_needed && !sampler_needed {
                continue;
            }

            ctx.set_active_unit(index as u32);
            if bind_needed {
                ctx.bind_texture(Some(unit.bound));
            }
            unit.sampler.apply(ctx, prev_sampler.as_ref());
        }

        let shader_switched = previous.is_none_or(|p| p.shader != self.shader);
        match program {
            Some(program) => {
                if shader_switched {
                    program.bind(ctx);
                    // New buffer identity: diff baselines are void
                    program.mark_all_dirty();
                }
                program.set_transform(&self.transform);
                program.set_stages(&self.stages);
                program.set_material(&self.material);
                program.set_lights(&self.lights);
                program.update_uniforms(ctx);
            }
            None => {
                if shader_switched {
                    ctx.use_shader(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Call, TraceContext};
    use crate::sampler::FilterMode;
    use crate::uniforms::FLAG_LIGHTING;

    fn textured_state(texture: TextureId) -> LogicalGPUState {
        let mut state = LogicalGPUState::default();
        state.bind_texture(0, texture, SamplerState::default());
        state
    }

    #[test]
    fn test_equivalence_reflexive() {
        let state = textured_state(TextureId(3));
        assert!(state.equivalent(&state));
    }

    #[test]
    fn test_equivalence_symmetric() {
        let a = textured_state(TextureId(3));
        let mut b = textured_state(TextureId(3));
        b.unit(0);
        assert_eq!(a.equivalent(&b), b.equivalent(&a));

        let c = textured_state(TextureId(4));
        assert_eq!(a.equivalent(&c), c.equivalent(&a));
        assert!(!a.equivalent(&c));
    }

    #[test]
    fn test_disabled_units_ignore_stale_ids() {
        let mut a = LogicalGPUState::default();
        let mut b = LogicalGPUState::default();
        // Different cached ids, but neither unit is enabled
        a.set_unit(2, TextureUnit { bound: TextureId(9), ..Default::default() });
        b.set_unit(2, TextureUnit { bound: TextureId(5), ..Default::default() });
        assert!(a.equivalent(&b));

        // Enabling the unit in one state makes the mismatch visible
        a.stages.enable(2);
        b.stages.enable(2);
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn test_unit_mismatch_breaks_equivalence_when_enabled_in_either() {
        let a = textured_state(TextureId(3));
        let mut b = a.clone();
        b.set_unit(
            0,
            TextureUnit {
                bound: TextureId(3),
                sampler: SamplerState {
                    mag_filter: FilterMode::Linear,
                    ..SamplerState::default()
                },
            },
        );
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn test_lights_only_compared_when_lighting_enabled() {
        let mut a = LogicalGPUState::default();
        let mut b = LogicalGPUState::default();
        b.lights.count = 2;
        assert!(a.equivalent(&b));

        a.transform.flags |= FLAG_LIGHTING;
        b.transform.flags |= FLAG_LIGHTING;
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn test_reconcile_against_self_emits_nothing() {
        let state = textured_state(TextureId(3));
        let mut ctx = TraceContext::new();
        state.reconcile(&mut ctx, None, Some(&state));
        assert!(ctx.calls().is_empty(), "got {:?}", ctx.calls());
    }

    #[test]
    fn test_full_reconcile_binds_enabled_units() {
        let state = textured_state(TextureId(3));
        let mut ctx = TraceContext::new();
        state.reconcile(&mut ctx, None, None);
        assert_eq!(ctx.count(|c| matches!(c, Call::ActiveUnit(0))), 1);
        assert_eq!(
            ctx.count(|c| matches!(c, Call::BindTexture(Some(TextureId(3))))),
            1
        );
        // Fresh bind applies the sampler in full
        assert_eq!(ctx.count(|c| matches!(c, Call::SamplerWrapS(_))), 1);
    }

    #[test]
    fn test_diff_reconcile_skips_unchanged_unit() {
        let previous = textured_state(TextureId(3));
        let mut state = previous.clone();
        state.global.line_width = 4.0;

        let mut ctx = TraceContext::new();
        state.reconcile(&mut ctx, None, Some(&previous));
        assert_eq!(ctx.calls(), &[Call::LineWidth(4.0)]);
    }

    #[test]
    fn test_diff_reconcile_rebinds_changed_texture_only() {
        let previous = textured_state(TextureId(3));
        let state = textured_state(TextureId(8));

        let mut ctx = TraceContext::new();
        state.reconcile(&mut ctx, None, Some(&previous));
        assert_eq!(
            ctx.calls(),
            &[
                Call::ActiveUnit(0),
                Call::BindTexture(Some(TextureId(8))),
            ]
        );
    }

    #[test]
    fn test_stale_id_on_disabled_unit_never_rebinds() {
        let mut previous = LogicalGPUState::default();
        previous.set_unit(1, TextureUnit { bound: TextureId(9), ..Default::default() });
        let mut state = previous.clone();
        state.set_unit(1, TextureUnit { bound: TextureId(4), ..Default::default() });

        let mut ctx = TraceContext::new();
        state.reconcile(&mut ctx, None, Some(&previous));
        assert_eq!(ctx.count(|c| matches!(c, Call::BindTexture(_))), 0);
    }

    #[test]
    fn test_round_trip_restores_state() {
        let a = textured_state(TextureId(3));
        let mut b = textured_state(TextureId(8));
        b.global.depth_write = false;

        let mut ctx = TraceContext::new();
        b.reconcile(&mut ctx, None, Some(&a));
        let forward = ctx.take_calls();
        a.reconcile(&mut ctx, None, Some(&b));
        let back = ctx.take_calls();

        assert!(forward.contains(&Call::DepthWrite(false)));
        assert!(back.contains(&Call::DepthWrite(true)));
        assert!(back.contains(&Call::BindTexture(Some(TextureId(3)))));
    }

    #[test]
    fn test_out_of_range_unit_is_ignored() {
        let mut state = LogicalGPUState::default();
        state.set_unit(MAX_TEXTURE_UNITS + 3, TextureUnit::default());
        assert!(state.units.len() <= MAX_TEXTURE_UNITS);
        // And reads past the end report unbound
        assert_eq!(state.unit(MAX_TEXTURE_UNITS + 3).bound, TextureId::INVALID);
    }

    #[test]
    fn test_shader_identity_change_breaks_equivalence() {
        let mut a = LogicalGPUState::default();
        let mut b = LogicalGPUState::default();
        a.shader = Some(ShaderId(1));
        b.shader = Some(ShaderId(2));
        assert!(!a.equivalent(&b));
    }
}
