//! Compiled static geometry
//!
//! Pre-tessellated meshes uploaded once to static buffers and drawn by
//! index, bypassing the streaming batch entirely. The renderer still owns
//! state: it flushes and applies the current state before handing the draw
//! off to the buffer.

use crate::error::GraphicsError;
use crate::vertex::Vertex;

/// One mesh's tessellated triangle data, indices local to the mesh
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Static geometry storage, indexed by mesh position in the uploaded set.
///
/// Implementations pack all meshes into one vertex and one index buffer,
/// rebasing each mesh's indices, and draw a mesh as one indexed range.
/// Drawing an index that was never uploaded is a silent no-op.
pub trait GeometryBuffer {
    /// Replace the buffer contents with `meshes`, packed in order.
    fn upload(&mut self, meshes: &[MeshData]) -> Result<(), GraphicsError>;

    /// Draw one uploaded mesh. Unknown indices draw nothing.
    fn draw(&mut self, mesh_index: usize);

    /// Drop all GPU-side storage, e.g. on context loss. The buffer must be
    /// re-uploaded before drawing again.
    fn invalidate(&mut self);
}

/// Recording implementation for tests: remembers uploaded mesh sizes and
/// which meshes were drawn.
#[derive(Debug, Default)]
pub struct TraceGeometryBuffer {
    mesh_sizes: Vec<usize>,
    pub draws: Vec<usize>,
}

impl TraceGeometryBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeometryBuffer for TraceGeometryBuffer {
    fn upload(&mut self, meshes: &[MeshData]) -> Result<(), GraphicsError> {
        self.mesh_sizes = meshes.iter().map(|m| m.indices.len()).collect();
        Ok(())
    }

    fn draw(&mut self, mesh_index: usize) {
        let Some(&size) = self.mesh_sizes.get(mesh_index) else {
            return;
        };
        if size == 0 {
            return;
        }
        self.draws.push(mesh_index);
    }

    fn invalidate(&mut self) {
        self.mesh_sizes.clear();
    }
}
