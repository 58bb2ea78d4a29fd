//! Error types for GPU resource creation
//!
//! Reconciliation and batching are infallible by design: degenerate geometry
//! and unregistered handles are silent no-ops so a single bad caller can't
//! stall the render loop. Errors only arise when the GL backend creates
//! resources (buffers, textures, shader programs).

use thiserror::Error;

/// Errors surfaced by the GL backend during resource creation.
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// GL object allocation failed (buffer, texture, VAO, sync object)
    #[error("failed to allocate GL object: {0}")]
    Allocation(String),

    /// Shader compilation failed
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    /// Program link failed
    #[error("program link failed: {0}")]
    ProgramLink(String),
}
