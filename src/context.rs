//! The low-level graphics call sink
//!
//! Defines opaque resource handles and the `GraphicsContext` trait: one
//! method per underlying state-change or draw primitive. The reconciliation
//! engine only ever talks to this boundary, so the number of emitted calls is
//! directly observable. `GlowContext` implements it over real GL;
//! `TraceContext` records every call for tests and frame debugging.

use crate::error::GraphicsError;
use crate::global_state::{BlendEquation, BlendFactors, CullMode, DepthFunc, Viewport};
use crate::sampler::{FilterMode, WrapMode};

/// Handle to a texture owned by a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureId(pub u32);

impl TextureId {
    /// Invalid/unbound texture handle
    pub const INVALID: TextureId = TextureId(0);
}

/// Handle to a linked shader program owned by a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Handle to a uniform-block backing buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBufferId(pub u32);

/// Handle to a GPU completion marker (fence sync)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// Capabilities reported by the underlying context
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextCaps {
    /// Whether the context can render antialiased line strips natively.
    /// When false, smooth line strips degrade to triangle geometry.
    pub native_line_smooth: bool,
}

/// The opaque call sink for state changes and draws.
///
/// Method order in `LogicalGPUState::reconcile` follows the declaration
/// order here: depth, blend, cull, line/point, clear color, viewport,
/// texture units, shader, uniforms, draws.
pub trait GraphicsContext {
    fn caps(&self) -> ContextCaps;

    // Global state
    fn set_depth_write(&mut self, enabled: bool);
    fn set_depth_func(&mut self, func: DepthFunc);
    fn set_depth_range(&mut self, near: f32, far: f32);
    fn set_blend_equation(&mut self, equation: BlendEquation);
    fn set_blend_factors(&mut self, factors: BlendFactors);
    fn set_cull_mode(&mut self, mode: CullMode);
    fn set_line_width(&mut self, width: f32);
    fn set_line_smooth(&mut self, enabled: bool);
    fn set_point_smooth(&mut self, enabled: bool);
    fn set_point_size(&mut self, size: f32);
    fn set_clear_color(&mut self, color: [f32; 4]);
    fn set_viewport(&mut self, viewport: Viewport);

    // Texture units; sampler params apply to the texture bound on the
    // active unit.
    fn set_active_unit(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: Option<TextureId>);
    fn set_sampler_wrap_s(&mut self, wrap: WrapMode);
    fn set_sampler_wrap_t(&mut self, wrap: WrapMode);
    fn set_sampler_min_filter(&mut self, filter: FilterMode, mipmap: bool);
    fn set_sampler_mag_filter(&mut self, filter: FilterMode);

    // Shader + uniform blocks
    fn use_shader(&mut self, shader: Option<ShaderId>);
    fn create_uniform_buffer(&mut self, size: usize) -> Result<UniformBufferId, GraphicsError>;
    fn bind_uniform_buffer(&mut self, slot: u32, buffer: UniformBufferId);
    fn upload_uniform_block(&mut self, buffer: UniformBufferId, data: &[u8]);

    // Stream geometry (the batch's buffers; created once, reused per flush)
    fn upload_stream(&mut self, vertex_bytes: &[u8], indices: &[u32]);
    fn draw_triangles(&mut self, index_count: u32);
    fn draw_line_strip(&mut self, vertex_count: u32);

    // Framebuffer
    fn clear(&mut self, color: bool, depth: bool);
    fn read_pixels(&mut self, rect: Viewport) -> Vec<u8>;

    // Completion markers
    fn insert_marker(&mut self) -> MarkerId;
    /// Bounded wait; returns false if the timeout expired before the marker
    /// signaled. Expiry is advisory, never an error.
    fn wait_marker(&mut self, marker: MarkerId, timeout_ns: u64) -> bool;
}

/// One recorded sink call (mirrors `GraphicsContext` one-to-one)
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DepthWrite(bool),
    DepthFunc(DepthFunc),
    DepthRange(f32, f32),
    BlendEquation(BlendEquation),
    BlendFactors(BlendFactors),
    CullMode(CullMode),
    LineWidth(f32),
    LineSmooth(bool),
    PointSmooth(bool),
    PointSize(f32),
    ClearColor([f32; 4]),
    Viewport(Viewport),
    ActiveUnit(u32),
    BindTexture(Option<TextureId>),
    SamplerWrapS(WrapMode),
    SamplerWrapT(WrapMode),
    SamplerMinFilter(FilterMode, bool),
    SamplerMagFilter(FilterMode),
    UseShader(Option<ShaderId>),
    CreateUniformBuffer(usize),
    BindUniformBuffer(u32, UniformBufferId),
    UploadUniformBlock(UniformBufferId, usize),
    UploadStream { vertex_bytes: usize, index_count: usize },
    DrawTriangles(u32),
    DrawLineStrip(u32),
    Clear { color: bool, depth: bool },
    ReadPixels(Viewport),
    InsertMarker(MarkerId),
    WaitMarker(MarkerId, u64),
}

/// Recording sink: every call is appended to a trace.
///
/// Backs the testable properties (e.g. "reconcile against itself emits zero
/// calls") and doubles as a frame-debugging tool.
#[derive(Debug, Default)]
pub struct TraceContext {
    calls: Vec<Call>,
    next_buffer: u32,
    next_marker: u64,
    caps: ContextCaps,
    /// What `wait_marker` reports; set false to simulate timeouts.
    pub wait_signaled: bool,
}

impl TraceContext {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_buffer: 0,
            next_marker: 0,
            caps: ContextCaps::default(),
            wait_signaled: true,
        }
    }

    pub fn with_caps(caps: ContextCaps) -> Self {
        Self { caps, ..Self::new() }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Drain the trace, leaving it empty.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| matches(c)).count()
    }

    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }
}

impl GraphicsContext for TraceContext {
    fn caps(&self) -> ContextCaps {
        self.caps
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.record(Call::DepthWrite(enabled));
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.record(Call::DepthFunc(func));
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.record(Call::DepthRange(near, far));
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.record(Call::BlendEquation(equation));
    }

    fn set_blend_factors(&mut self, factors: BlendFactors) {
        self.record(Call::BlendFactors(factors));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.record(Call::CullMode(mode));
    }

    fn set_line_width(&mut self, width: f32) {
        self.record(Call::LineWidth(width));
    }

    fn set_line_smooth(&mut self, enabled: bool) {
        self.record(Call::LineSmooth(enabled));
    }

    fn set_point_smooth(&mut self, enabled: bool) {
        self.record(Call::PointSmooth(enabled));
    }

    fn set_point_size(&mut self, size: f32) {
        self.record(Call::PointSize(size));
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.record(Call::ClearColor(color));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(Call::Viewport(viewport));
    }

    fn set_active_unit(&mut self, unit: u32) {
        self.record(Call::ActiveUnit(unit));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.record(Call::BindTexture(texture));
    }

    fn set_sampler_wrap_s(&mut self, wrap: WrapMode) {
        self.record(Call::SamplerWrapS(wrap));
    }

    fn set_sampler_wrap_t(&mut self, wrap: WrapMode) {
        self.record(Call::SamplerWrapT(wrap));
    }

    fn set_sampler_min_filter(&mut self, filter: FilterMode, mipmap: bool) {
        self.record(Call::SamplerMinFilter(filter, mipmap));
    }

    fn set_sampler_mag_filter(&mut self, filter: FilterMode) {
        self.record(Call::SamplerMagFilter(filter));
    }

    fn use_shader(&mut self, shader: Option<ShaderId>) {
        self.record(Call::UseShader(shader));
    }

    fn create_uniform_buffer(&mut self, size: usize) -> Result<UniformBufferId, GraphicsError> {
        self.record(Call::CreateUniformBuffer(size));
        self.next_buffer += 1;
        Ok(UniformBufferId(self.next_buffer))
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: UniformBufferId) {
        self.record(Call::BindUniformBuffer(slot, buffer));
    }

    fn upload_uniform_block(&mut self, buffer: UniformBufferId, data: &[u8]) {
        self.record(Call::UploadUniformBlock(buffer, data.len()));
    }

    fn upload_stream(&mut self, vertex_bytes: &[u8], indices: &[u32]) {
        self.record(Call::UploadStream {
            vertex_bytes: vertex_bytes.len(),
            index_count: indices.len(),
        });
    }

    fn draw_triangles(&mut self, index_count: u32) {
        self.record(Call::DrawTriangles(index_count));
    }

    fn draw_line_strip(&mut self, vertex_count: u32) {
        self.record(Call::DrawLineStrip(vertex_count));
    }

    fn clear(&mut self, color: bool, depth: bool) {
        self.record(Call::Clear { color, depth });
    }

    fn read_pixels(&mut self, rect: Viewport) -> Vec<u8> {
        self.record(Call::ReadPixels(rect));
        vec![0; (rect.width.max(0) as usize) * (rect.height.max(0) as usize) * 4]
    }

    fn insert_marker(&mut self) -> MarkerId {
        self.next_marker += 1;
        let marker = MarkerId(self.next_marker);
        self.record(Call::InsertMarker(marker));
        marker
    }

    fn wait_marker(&mut self, marker: MarkerId, timeout_ns: u64) -> bool {
        self.record(Call::WaitMarker(marker, timeout_ns));
        self.wait_signaled
    }
}
