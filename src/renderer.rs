//! Renderer orchestration
//!
//! `Renderer` is the upstream surface of the engine: it owns the call sink,
//! the current logical state, the last-applied snapshot, the open batch, the
//! texture registry, the shader table and the completion-marker ring.
//!
//! The ordering contract is simple: state changes are cheap value writes,
//! draws accumulate, and the GPU only hears about any of it on flush. A
//! flush happens when a non-equivalent state arrives while a batch is open,
//! when a draw cannot be batched (native line strips, shader overrides,
//! compiled geometry), or before any externally observable effect
//! (readback, clear, texture mutation).

use hashbrown::HashMap;

use crate::batch::DrawBatch;
use crate::context::{GraphicsContext, ShaderId, TextureId};
use crate::error::GraphicsError;
use crate::fence::{DEFAULT_MARKER_TIMEOUT_NS, DEFAULT_RING_DEPTH, MarkerRing};
use crate::geometry::GeometryBuffer;
use crate::global_state::Viewport;
use crate::registry::TextureRegistry;
use crate::sampler::SamplerState;
use crate::shader::ShaderProgram;
use crate::state::LogicalGPUState;
use crate::topology;
use crate::uniforms::MAX_TEXTURE_UNITS;
use crate::vertex::{StreamVertex, Vertex};

/// Tuning knobs; the defaults match the legacy workload
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub marker_ring_depth: usize,
    pub marker_timeout_ns: u64,
    pub batch_vertex_capacity: usize,
    pub batch_index_capacity: usize,
    /// Overrides the context's reported native smooth-line support
    pub native_line_smooth: Option<bool>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            marker_ring_depth: DEFAULT_RING_DEPTH,
            marker_timeout_ns: DEFAULT_MARKER_TIMEOUT_NS,
            batch_vertex_capacity: 4096,
            batch_index_capacity: 6144,
            native_line_smooth: None,
        }
    }
}

/// Running counters, logged at `debug!` on flush
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushStats {
    /// Flushes that reached the GPU
    pub flushes: u64,
    /// Logical draws appended to batches
    pub draws_batched: u64,
    /// `set_state` calls that replaced the state with a non-equivalent one
    pub state_changes: u64,
}

pub struct Renderer<C: GraphicsContext> {
    ctx: C,
    config: RendererConfig,
    /// What the caller asked for
    current: LogicalGPUState,
    /// What the GPU last heard; `None` forces full reconciliation
    applied: Option<LogicalGPUState>,
    batch: DrawBatch,
    textures: TextureRegistry,
    shaders: HashMap<ShaderId, ShaderProgram>,
    ring: MarkerRing,
    stats: FlushStats,
}

impl<C: GraphicsContext> Renderer<C> {
    pub fn new(ctx: C) -> Self {
        Self::with_config(ctx, RendererConfig::default())
    }

    pub fn with_config(ctx: C, config: RendererConfig) -> Self {
        Self {
            ctx,
            current: LogicalGPUState::default(),
            applied: None,
            batch: DrawBatch::with_capacity(
                config.batch_vertex_capacity,
                config.batch_index_capacity,
            ),
            textures: TextureRegistry::new(),
            shaders: HashMap::new(),
            ring: MarkerRing::new(config.marker_ring_depth, config.marker_timeout_ns),
            stats: FlushStats::default(),
            config,
        }
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn current_state(&self) -> &LogicalGPUState {
        &self.current
    }

    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    // --- state ---

    /// Replace the current state wholesale. Unregistered texture ids are
    /// treated as unbound and an unregistered shader id as inactive; neither
    /// is an error. Flushes first iff a batch is open and the new state is
    /// not equivalent to the one the batch committed to.
    pub fn set_state(&mut self, mut state: LogicalGPUState) {
        self.sanitize(&mut state);
        if let Some(open) = self.batch.state()
            && !state.equivalent(open)
        {
            self.flush_command_queue();
        }
        if !state.equivalent(&self.current) {
            self.stats.state_changes += 1;
        }
        self.current = state;
    }

    fn sanitize(&self, state: &mut LogicalGPUState) {
        for index in 0..MAX_TEXTURE_UNITS {
            let unit = state.unit(index);
            if unit.bound != TextureId::INVALID && !self.textures.contains(unit.bound) {
                state.set_unit(
                    index,
                    crate::state::TextureUnit {
                        bound: TextureId::INVALID,
                        sampler: unit.sampler,
                    },
                );
            }
        }
        if let Some(shader) = state.shader
            && !self.shaders.contains_key(&shader)
        {
            state.shader = None;
        }
    }

    // --- batched draws ---

    pub fn draw_quads(&mut self, vertices: &[Vertex]) {
        let indices = topology::quad_list(vertices.len());
        self.append(vertices, &indices);
    }

    pub fn draw_quad_strip(&mut self, vertices: &[Vertex]) {
        let indices = topology::quad_strip(vertices.len());
        self.append(vertices, &indices);
    }

    pub fn draw_symmetric_quad_strip(&mut self, vertices: &[Vertex]) {
        let indices = topology::symmetric_quad_strip(vertices.len());
        self.append(vertices, &indices);
    }

    pub fn draw_triangle_fan(&mut self, vertices: &[Vertex]) {
        let indices = topology::triangle_fan(vertices.len());
        self.append(vertices, &indices);
    }

    pub fn draw_triangle_strip(&mut self, vertices: &[Vertex]) {
        let indices = topology::triangle_strip(vertices.len());
        self.append(vertices, &indices);
    }

    pub fn draw_triangles(&mut self, vertices: &[Vertex]) {
        let indices = topology::triangle_list(vertices.len());
        self.append(vertices, &indices);
    }

    /// Antialiased line strip. Uses the context's native path when it has
    /// one; otherwise degrades to triangle geometry appended to the batch.
    pub fn draw_line_strip(&mut self, vertices: &[Vertex]) {
        if vertices.len() < 2 {
            return;
        }
        let native = self
            .config
            .native_line_smooth
            .unwrap_or(self.ctx.caps().native_line_smooth);
        if native || !self.current.global.line_smooth {
            self.flush_command_queue();
            self.ring.before_buffer_reuse(&mut self.ctx);
            self.apply_current_state();
            let stream: Vec<StreamVertex> = vertices.iter().map(StreamVertex::from).collect();
            self.ctx.upload_stream(bytemuck::cast_slice(&stream), &[]);
            self.ctx.draw_line_strip(vertices.len() as u32);
            self.ring.signal(&mut self.ctx);
        } else {
            let (expanded, indices) =
                topology::expand_line_strip(vertices, self.current.global.line_width);
            self.append(&expanded, &indices);
        }
    }

    fn append(&mut self, vertices: &[Vertex], indices: &[u32]) {
        if indices.is_empty() {
            return;
        }
        self.batch.open(self.current.clone());
        self.batch.add_draw(vertices, indices);
        self.stats.draws_batched += 1;
    }

    // --- unbatched draws ---

    /// Draw one triangle list under a shader override without disturbing the
    /// current state. An unregistered shader id draws with no program bound.
    pub fn draw_triangles_with_shader(&mut self, shader: ShaderId, vertices: &[Vertex]) {
        let indices = topology::triangle_list(vertices.len());
        if indices.is_empty() {
            return;
        }
        self.flush_command_queue();
        self.ring.before_buffer_reuse(&mut self.ctx);

        let mut state = self.current.clone();
        state.shader = self.shaders.contains_key(&shader).then_some(shader);
        let program = state.shader.and_then(|id| self.shaders.get_mut(&id));
        state.reconcile(&mut self.ctx, program, self.applied.as_ref());

        let stream: Vec<StreamVertex> = vertices.iter().map(StreamVertex::from).collect();
        self.ctx.upload_stream(bytemuck::cast_slice(&stream), &indices);
        self.ctx.draw_triangles(indices.len() as u32);
        self.ring.signal(&mut self.ctx);
        self.applied = Some(state);
    }

    /// Draw one mesh from pre-uploaded static geometry. Flushes first so the
    /// mesh renders in submission order under the current state.
    pub fn draw_compiled_geometry(&mut self, geometry: &mut dyn GeometryBuffer, mesh_index: usize) {
        self.flush_command_queue();
        self.apply_current_state();
        geometry.draw(mesh_index);
    }

    // --- flushing ---

    /// Reconcile, upload and draw the open batch, if any.
    pub fn flush_command_queue(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        self.ring.before_buffer_reuse(&mut self.ctx);

        let index_count = self.batch.index_count();
        let program = self
            .batch
            .state()
            .and_then(|s| s.shader)
            .and_then(|id| self.shaders.get_mut(&id));
        if let Some(applied) = self.batch.flush(&mut self.ctx, program, self.applied.as_ref()) {
            self.ring.signal(&mut self.ctx);
            self.applied = Some(applied);
            self.stats.flushes += 1;
            tracing::debug!(
                indices = index_count,
                flushes = self.stats.flushes,
                draws_batched = self.stats.draws_batched,
                "command queue flushed"
            );
        }
    }

    fn apply_current_state(&mut self) {
        let program = self.current.shader.and_then(|id| self.shaders.get_mut(&id));
        self.current.reconcile(&mut self.ctx, program, self.applied.as_ref());
        self.applied = Some(self.current.clone());
    }

    // --- framebuffer ---

    pub fn clear(&mut self) {
        self.flush_command_queue();
        self.apply_current_state();
        self.ctx.clear(true, true);
    }

    pub fn clear_depth_buffer(&mut self) {
        self.flush_command_queue();
        self.apply_current_state();
        self.ctx.clear(false, true);
    }

    /// Read back a framebuffer rectangle. Flushes first; pixels reflect all
    /// draws submitted so far.
    pub fn read_pixels(&mut self, rect: Viewport) -> Vec<u8> {
        self.flush_command_queue();
        self.ctx.read_pixels(rect)
    }

    // --- resource notifications ---

    pub fn register_texture(&mut self, id: TextureId, sampler: SamplerState) {
        self.textures.register(id, sampler);
    }

    /// Note that a registered texture's contents are about to change. Any
    /// open batch sampling it must draw from the old contents, so flush.
    pub fn texture_modified(&mut self, id: TextureId) {
        let referenced = self
            .batch
            .state()
            .is_some_and(|s| state_references(s, id));
        if referenced {
            self.flush_command_queue();
        }
    }

    /// Forget a texture. Units bound to it in both the current and the
    /// applied snapshots are cleared so reconciliation can never touch the
    /// freed handle again.
    pub fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(id).is_none() {
            return;
        }
        self.flush_command_queue();
        self.current.clear_texture(id);
        if let Some(applied) = &mut self.applied {
            applied.clear_texture(id);
        }
    }

    /// Register a linked program; allocates its uniform-block buffers.
    pub fn register_shader(&mut self, id: ShaderId) -> Result<(), GraphicsError> {
        let program = ShaderProgram::new(id, &mut self.ctx)?;
        self.shaders.insert(id, program);
        Ok(())
    }

    /// Context loss: every diff baseline is void and every texture handle is
    /// stale. The next reconciliation applies everything in full and
    /// re-uploads every uniform block; textures must be re-registered.
    pub fn invalidate(&mut self) {
        self.applied = None;
        for program in self.shaders.values_mut() {
            program.invalidate();
        }
        self.textures.clear();
        for unit in self.current.units.iter_mut() {
            unit.bound = TextureId::INVALID;
        }
        self.batch.clear();
        self.ring.reset();
    }
}

fn state_references(state: &LogicalGPUState, texture: TextureId) -> bool {
    (0..MAX_TEXTURE_UNITS)
        .any(|index| state.unit_enabled(index) && state.unit(index).bound == texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Call, TraceContext};

    fn renderer() -> Renderer<TraceContext> {
        Renderer::new(TraceContext::new())
    }

    fn quad() -> Vec<Vertex> {
        vec![
            Vertex::xy(0.0, 0.0),
            Vertex::xy(1.0, 0.0),
            Vertex::xy(1.0, 1.0),
            Vertex::xy(0.0, 1.0),
        ]
    }

    #[test]
    fn test_draws_accumulate_until_flush() {
        let mut r = renderer();
        r.draw_quads(&quad());
        r.draw_quads(&quad());
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(_))), 0);

        r.flush_command_queue();
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(12))), 1);
    }

    #[test]
    fn test_equivalent_state_does_not_flush() {
        let mut r = renderer();
        r.draw_quads(&quad());
        r.set_state(LogicalGPUState::default());
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(_))), 0);
    }

    #[test]
    fn test_non_equivalent_state_flushes_open_batch() {
        let mut r = renderer();
        r.draw_quads(&quad());
        let mut state = LogicalGPUState::default();
        state.global.line_width = 3.0;
        r.set_state(state);
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(6))), 1);
    }

    #[test]
    fn test_unregistered_texture_treated_unbound() {
        let mut r = renderer();
        let mut state = LogicalGPUState::default();
        state.bind_texture(0, TextureId(99), SamplerState::default());
        r.set_state(state);
        assert_eq!(r.current_state().unit(0).bound, TextureId::INVALID);
    }

    #[test]
    fn test_unregistered_shader_treated_inactive() {
        let mut r = renderer();
        let mut state = LogicalGPUState::default();
        state.shader = Some(ShaderId(42));
        r.set_state(state);
        assert_eq!(r.current_state().shader, None);
    }

    #[test]
    fn test_degenerate_draw_is_silent_noop() {
        let mut r = renderer();
        r.draw_quads(&quad()[..3]);
        r.draw_triangle_fan(&quad()[..2]);
        r.draw_symmetric_quad_strip(&quad());
        r.flush_command_queue();
        assert!(r.context().calls().is_empty());
    }

    #[test]
    fn test_delete_texture_clears_current_and_applied() {
        let mut r = renderer();
        let texture = TextureId(7);
        r.register_texture(texture, SamplerState::default());
        let mut state = LogicalGPUState::default();
        state.bind_texture(0, texture, SamplerState::default());
        r.set_state(state);
        r.draw_quads(&quad());
        r.flush_command_queue();

        r.delete_texture(texture);
        assert_eq!(r.current_state().unit(0).bound, TextureId::INVALID);
        // Rebinding the same (now stale) id must not reach the sink
        r.context_mut().clear_calls();
        r.draw_quads(&quad());
        r.flush_command_queue();
        assert_eq!(
            r.context()
                .count(|c| matches!(c, Call::BindTexture(Some(TextureId(7))))),
            0
        );
    }

    #[test]
    fn test_clear_flushes_first() {
        let mut r = renderer();
        r.draw_quads(&quad());
        r.clear();
        let calls = r.context().calls();
        let draw = calls
            .iter()
            .position(|c| matches!(c, Call::DrawTriangles(_)))
            .unwrap();
        let clear = calls
            .iter()
            .position(|c| matches!(c, Call::Clear { .. }))
            .unwrap();
        assert!(draw < clear);
    }

    #[test]
    fn test_read_pixels_flushes_first() {
        let mut r = renderer();
        r.draw_quads(&quad());
        let rect = Viewport { x: 0, y: 0, width: 2, height: 2 };
        let pixels = r.read_pixels(rect);
        assert_eq!(pixels.len(), 16);
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(_))), 1);
    }

    #[test]
    fn test_texture_modified_flushes_only_when_batch_samples_it() {
        let mut r = renderer();
        let texture = TextureId(3);
        r.register_texture(texture, SamplerState::default());

        r.draw_quads(&quad());
        r.texture_modified(texture);
        // Untextured batch keeps accumulating
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(_))), 0);

        let mut state = LogicalGPUState::default();
        state.bind_texture(0, texture, SamplerState::default());
        r.set_state(state);
        r.draw_quads(&quad());
        r.texture_modified(texture);
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(_))), 2);
    }

    #[test]
    fn test_invalidate_forces_full_reapply() {
        let mut r = renderer();
        r.draw_quads(&quad());
        r.flush_command_queue();
        let full = r.context_mut().take_calls().len();

        // Steady state: an identical flush emits no state calls
        r.draw_quads(&quad());
        r.flush_command_queue();
        let steady = r.context_mut().take_calls().len();
        assert!(steady < full);

        r.invalidate();
        r.draw_quads(&quad());
        r.flush_command_queue();
        let after_loss = r.context_mut().take_calls().len();
        assert!(after_loss > steady);
    }

    #[test]
    fn test_invalidate_drops_texture_registrations() {
        let mut r = renderer();
        let texture = TextureId(2);
        r.register_texture(texture, SamplerState::default());
        let mut state = LogicalGPUState::default();
        state.bind_texture(0, texture, SamplerState::default());
        r.set_state(state.clone());

        r.invalidate();
        assert_eq!(r.current_state().unit(0).bound, TextureId::INVALID);
        // The id is gone from the registry, so re-submitting the old state
        // sanitizes it back to unbound
        r.set_state(state);
        assert_eq!(r.current_state().unit(0).bound, TextureId::INVALID);
    }

    #[test]
    fn test_native_line_strip_bypasses_batch() {
        let mut r = Renderer::with_config(
            TraceContext::new(),
            RendererConfig {
                native_line_smooth: Some(true),
                ..RendererConfig::default()
            },
        );
        let mut state = LogicalGPUState::default();
        state.global.line_smooth = true;
        r.set_state(state);
        r.draw_line_strip(&[Vertex::xy(0.0, 0.0), Vertex::xy(4.0, 0.0)]);
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawLineStrip(2))), 1);
    }

    #[test]
    fn test_smooth_line_strip_degrades_without_native_support() {
        let mut r = renderer();
        let mut state = LogicalGPUState::default();
        state.global.line_smooth = true;
        r.set_state(state);
        r.draw_line_strip(&[Vertex::xy(0.0, 0.0), Vertex::xy(4.0, 0.0)]);
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawLineStrip(_))), 0);
        r.flush_command_queue();
        assert_eq!(r.context().count(|c| matches!(c, Call::DrawTriangles(_))), 1);
    }

    #[test]
    fn test_shader_override_restores_batching_state() {
        let mut r = renderer();
        r.register_shader(ShaderId(1)).unwrap();
        let triangle = [
            Vertex::xy(0.0, 0.0),
            Vertex::xy(1.0, 0.0),
            Vertex::xy(0.0, 1.0),
        ];
        r.draw_triangles_with_shader(ShaderId(1), &triangle);
        assert_eq!(
            r.context()
                .count(|c| matches!(c, Call::UseShader(Some(ShaderId(1))))),
            1
        );
        // The override never leaks into the current state
        assert_eq!(r.current_state().shader, None);
    }
}
