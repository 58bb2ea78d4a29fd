//! Draw batching
//!
//! `DrawBatch` accumulates vertex and triangle-index data for one open
//! sequence of draws sharing equivalent state. Indices are rebased by the
//! batch's vertex count on append so successive draws share one buffer
//! without collisions. Flushing uploads both accumulations with a streaming
//! usage hint and issues exactly one indexed draw call, then clears the
//! accumulator without releasing capacity; the GPU-side buffers are created
//! once by the backend and reused across flushes.

use crate::context::GraphicsContext;
use crate::state::LogicalGPUState;
use crate::vertex::{StreamVertex, Vertex};

/// Accumulated geometry for one open batch
#[derive(Debug, Default)]
pub struct DrawBatch {
    vertices: Vec<StreamVertex>,
    indices: Vec<u32>,
    /// State in effect when the batch was opened; every appended draw was
    /// requested under a state equivalent to it.
    state: Option<LogicalGPUState>,
}

impl DrawBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
            state: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// The state this batch was opened under, if open.
    pub fn state(&self) -> Option<&LogicalGPUState> {
        self.state.as_ref()
    }

    /// Commit the state the batch runs under. Only the first call per open
    /// sequence takes effect; later draws must be equivalent anyway.
    pub fn open(&mut self, state: LogicalGPUState) {
        if self.state.is_none() {
            self.state = Some(state);
        }
    }

    /// Append one logical draw: vertices plus indices local to them. The
    /// indices are rebased by the current vertex count.
    pub fn add_draw(&mut self, vertices: &[Vertex], indices: &[u32]) {
        if indices.is_empty() {
            return;
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend(vertices.iter().map(StreamVertex::from));
        self.indices.extend(indices.iter().map(|i| i + base));
    }

    /// Upload the accumulation and issue one indexed draw spanning it. If
    /// `previous` is given, the batch state is applied via diff
    /// reconciliation immediately beforehand; otherwise unconditionally.
    /// No-op when empty. Returns the state now applied on the GPU.
    pub fn flush<C: GraphicsContext>(
        &mut self,
        ctx: &mut C,
        program: Option<&mut crate::shader::ShaderProgram>,
        previous: Option<&LogicalGPUState>,
    ) -> Option<LogicalGPUState> {
        if self.is_empty() {
            return None;
        }
        let state = self.state.take().unwrap_or_default();
        state.reconcile(ctx, program, previous);

        ctx.upload_stream(bytemuck::cast_slice(&self.vertices), &self.indices);
        ctx.draw_triangles(self.indices.len() as u32);
        tracing::trace!(
            vertices = self.vertices.len(),
            indices = self.indices.len(),
            "batch flush"
        );

        self.clear();
        Some(state)
    }

    /// Clear the accumulator, retaining capacity.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.state = None;
    }

    #[cfg(test)]
    pub(crate) fn indices(&self) -> &[u32] {
        &self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Call, TraceContext};
    use crate::topology;
    use crate::vertex::STREAM_VERTEX_STRIDE;

    fn quad() -> Vec<Vertex> {
        vec![
            Vertex::xy(0.0, 0.0),
            Vertex::xy(1.0, 0.0),
            Vertex::xy(1.0, 1.0),
            Vertex::xy(0.0, 1.0),
        ]
    }

    #[test]
    fn test_index_rebasing() {
        let mut batch = DrawBatch::new();
        let quad = quad();
        let indices = topology::quad_list(4);

        batch.add_draw(&quad, &indices);
        batch.add_draw(&quad, &indices);

        assert_eq!(&batch.indices()[..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&batch.indices()[6..], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(batch.vertex_count(), 8);
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let mut batch = DrawBatch::new();
        let mut ctx = TraceContext::new();
        assert!(batch.flush(&mut ctx, None, None).is_none());
        assert!(ctx.calls().is_empty());
    }

    #[test]
    fn test_flush_issues_one_draw_spanning_all_batched_quads() {
        let mut batch = DrawBatch::new();
        let quad = quad();
        let indices = topology::quad_list(4);
        let n = 7;
        for _ in 0..n {
            batch.add_draw(&quad, &indices);
        }

        let mut ctx = TraceContext::new();
        batch.open(LogicalGPUState::default());
        batch.flush(&mut ctx, None, None);

        let draws: Vec<_> = ctx
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::DrawTriangles(_)))
            .collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0], &Call::DrawTriangles(6 * n));

        let upload = ctx
            .calls()
            .iter()
            .find(|c| matches!(c, Call::UploadStream { .. }))
            .unwrap();
        assert_eq!(
            upload,
            &Call::UploadStream {
                vertex_bytes: 4 * n as usize * STREAM_VERTEX_STRIDE,
                index_count: 6 * n as usize,
            }
        );
    }

    #[test]
    fn test_flush_clears_but_batch_remains_usable() {
        let mut batch = DrawBatch::new();
        let quad = quad();
        batch.add_draw(&quad, &topology::quad_list(4));
        let mut ctx = TraceContext::new();
        batch.open(LogicalGPUState::default());
        batch.flush(&mut ctx, None, None);

        assert!(batch.is_empty());
        assert!(batch.state().is_none());

        batch.add_draw(&quad, &topology::quad_list(4));
        assert_eq!(&batch.indices()[..6], &[0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn test_open_commits_first_state_only() {
        let mut batch = DrawBatch::new();
        let mut first = LogicalGPUState::default();
        first.global.line_width = 2.0;
        batch.open(first.clone());
        batch.open(LogicalGPUState::default());
        assert_eq!(batch.state().unwrap().global.line_width, 2.0);
    }

    #[test]
    fn test_empty_index_draw_is_ignored() {
        let mut batch = DrawBatch::new();
        batch.add_draw(&quad(), &[]);
        assert!(batch.is_empty());
        assert_eq!(batch.vertex_count(), 0);
    }
}
