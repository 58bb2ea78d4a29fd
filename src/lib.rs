//! Kiln render-state reconciliation and draw batching
//!
//! Sits between a legacy immediate-mode draw API (stateful, fine-grained,
//! redundant) and an explicit GPU backend. Callers describe state as plain
//! values and submit draws one primitive group at a time; the engine decides
//! what the GPU actually hears.
//!
//! # Architecture
//!
//! **LogicalGPUState** (value snapshots) → **DrawBatch** (accumulation) →
//! **GraphicsContext** (opaque call sink)
//!
//! - Callers build `LogicalGPUState` snapshots and hand them to the
//!   `Renderer` wholesale; setting state never touches the GPU.
//! - Draws expand to indexed triangles (`topology`) and accumulate in the
//!   open `DrawBatch` for as long as submitted states stay equivalent.
//! - A flush reconciles the batch's state against the last-applied snapshot
//!   (diffing emits only the calls that differ), streams the accumulated
//!   geometry in one upload, and issues one indexed draw.
//!
//! # Equivalence, not equality
//!
//! Batching and diffing both run on `LogicalGPUState::equivalent`: texture
//! units disabled in both states are ignored even when their cached bindings
//! differ, and light values only matter while lighting is enabled. This is
//! what lets sloppy legacy call patterns (redundant rebinds, stale unit
//! state) batch into single draws.
//!
//! # Backends
//!
//! `GraphicsContext` has two implementations: `GlowContext` over real GL and
//! `TraceContext`, which records every call so tests can assert on exactly
//! what the GPU would have heard. Call counts are the testable currency of
//! the whole crate.
//!
//! # Synchronization
//!
//! The stream buffers are reused every flush, so a small `MarkerRing` of
//! fence markers bounds how many flushes can be in flight. Waits are
//! advisory: a timeout logs and proceeds rather than stalling the frame.

pub mod batch;
pub mod context;
pub mod error;
pub mod fence;
pub mod geometry;
pub mod gl;
pub mod global_state;
pub mod registry;
pub mod renderer;
pub mod sampler;
pub mod shader;
pub mod state;
pub mod topology;
pub mod uniforms;
pub mod vertex;

pub use context::{
    ContextCaps, GraphicsContext, MarkerId, ShaderId, TextureId, TraceContext, UniformBufferId,
};
pub use error::GraphicsError;
pub use geometry::{GeometryBuffer, MeshData};
pub use gl::{GlGeometryBuffer, GlowContext};
pub use global_state::{BlendEquation, BlendFactors, CullMode, DepthFunc, GlobalState, Viewport};
pub use renderer::{FlushStats, Renderer, RendererConfig};
pub use sampler::{FilterMode, SamplerState, WrapMode};
pub use state::{LogicalGPUState, TextureUnit};
pub use vertex::Vertex;
