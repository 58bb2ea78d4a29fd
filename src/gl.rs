//! glow backend
//!
//! Production `GraphicsContext` over a real GL context. Owns the streaming
//! VAO/VBO/EBO pair (created once, re-filled with stream usage every flush),
//! the uniform-block buffers, and the tables mapping opaque handles to GL
//! objects. Also hosts the texture and program creation helpers and the
//! static-geometry buffer.
//!
//! Everything here is `unsafe` because glow is; the invariants are the usual
//! GL ones (objects used on the thread that owns the context, handles not
//! used after delete). The reconciliation layer above never sees any of it.

use std::sync::Arc;

use glow::HasContext;
use hashbrown::HashMap;

use crate::context::{
    ContextCaps, GraphicsContext, MarkerId, ShaderId, TextureId, UniformBufferId,
};
use crate::error::GraphicsError;
use crate::geometry::{GeometryBuffer, MeshData};
use crate::global_state::{BlendEquation, BlendFactors, CullMode, DepthFunc, Viewport};
use crate::sampler::{FilterMode, SamplerState, WrapMode};
use crate::vertex::{STREAM_VERTEX_STRIDE, StreamVertex};

// Compatibility-profile constants glow does not re-export
const GL_LINE_SMOOTH: u32 = 0x0B20;
const GL_POINT_SMOOTH: u32 = 0x0B10;

/// Uniform-block names the shader helpers wire to the shared binding slots,
/// indexed by slot
const BLOCK_NAMES: [&str; 4] = ["Transforms", "TextureStages", "Material", "Lights"];

pub struct GlowContext {
    gl: Arc<glow::Context>,
    caps: ContextCaps,

    stream_vao: glow::VertexArray,
    stream_vbo: glow::Buffer,
    stream_ebo: glow::Buffer,

    uniform_buffers: HashMap<UniformBufferId, glow::Buffer>,
    next_uniform_buffer: u32,
    textures: HashMap<TextureId, glow::Texture>,
    next_texture: u32,
    programs: HashMap<ShaderId, glow::Program>,
    next_program: u32,
    markers: HashMap<MarkerId, glow::Fence>,
    next_marker: u64,

    /// Fed to shaders as gl_PointSize input; GL core has no fixed-function
    /// point size
    point_size: f32,
}

impl GlowContext {
    /// Wrap a current GL context. `native_line_smooth` should be false for
    /// core and ES profiles, where `GL_LINE_SMOOTH` is gone.
    pub fn new(gl: Arc<glow::Context>, native_line_smooth: bool) -> Result<Self, GraphicsError> {
        unsafe {
            let stream_vao = gl.create_vertex_array().map_err(GraphicsError::Allocation)?;
            let stream_vbo = gl.create_buffer().map_err(GraphicsError::Allocation)?;
            let stream_ebo = gl.create_buffer().map_err(GraphicsError::Allocation)?;

            gl.bind_vertex_array(Some(stream_vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(stream_vbo));
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(stream_ebo));
            bind_stream_layout(&gl);
            gl.bind_vertex_array(None);

            gl.enable(glow::DEPTH_TEST);
            gl.enable(glow::BLEND);
            gl.enable(glow::PROGRAM_POINT_SIZE);

            tracing::debug!(
                renderer = %gl.get_parameter_string(glow::RENDERER),
                version = %gl.get_parameter_string(glow::VERSION),
                "gl context wrapped"
            );

            Ok(Self {
                gl,
                caps: ContextCaps { native_line_smooth },
                stream_vao,
                stream_vbo,
                stream_ebo,
                uniform_buffers: HashMap::new(),
                next_uniform_buffer: 0,
                textures: HashMap::new(),
                next_texture: 0,
                programs: HashMap::new(),
                next_program: 0,
                markers: HashMap::new(),
                next_marker: 0,
                point_size: 1.0,
            })
        }
    }

    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    /// Point size for shaders to write to gl_PointSize.
    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    /// Create an RGBA8 texture from tightly packed pixel data and apply the
    /// sampler parameters. Generates mipmaps when the sampler wants them.
    pub fn create_texture_rgba(
        &mut self,
        width: i32,
        height: i32,
        pixels: &[u8],
        sampler: &SamplerState,
    ) -> Result<TextureId, GraphicsError> {
        let gl = &self.gl;
        let texture = unsafe {
            let texture = gl.create_texture().map_err(GraphicsError::Allocation)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
            apply_sampler(gl, sampler);
            if sampler.mipmap {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            texture
        };
        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.textures.insert(id, texture);
        Ok(id)
    }

    /// Overwrite a rectangle of an existing texture. Unknown ids are
    /// ignored; the renderer treats them as unbound anyway.
    pub fn update_texture(
        &mut self,
        id: TextureId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        pixels: &[u8],
    ) {
        let Some(&texture) = self.textures.get(&id) else {
            return;
        };
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                x,
                y,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    /// Delete the GL texture behind an id. The renderer must be notified
    /// separately so its snapshots drop the handle.
    pub fn delete_texture(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.remove(&id) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    /// Compile and link a program and wire its uniform blocks to the shared
    /// binding slots.
    pub fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ShaderId, GraphicsError> {
        let gl = &self.gl;
        unsafe {
            let program = gl.create_program().map_err(GraphicsError::Allocation)?;
            let compile = |ty, src: &str| -> Result<glow::Shader, GraphicsError> {
                let shader = gl.create_shader(ty).map_err(GraphicsError::Allocation)?;
                gl.shader_source(shader, src);
                gl.compile_shader(shader);
                if !gl.get_shader_compile_status(shader) {
                    let log = gl.get_shader_info_log(shader);
                    gl.delete_shader(shader);
                    return Err(GraphicsError::ShaderCompile(log));
                }
                Ok(shader)
            };

            let vert = compile(glow::VERTEX_SHADER, vertex_src)?;
            let frag = compile(glow::FRAGMENT_SHADER, fragment_src)?;

            gl.attach_shader(program, vert);
            gl.attach_shader(program, frag);
            gl.link_program(program);
            let linked = gl.get_program_link_status(program);
            gl.detach_shader(program, vert);
            gl.detach_shader(program, frag);
            gl.delete_shader(vert);
            gl.delete_shader(frag);
            if !linked {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(GraphicsError::ProgramLink(log));
            }

            for (slot, name) in BLOCK_NAMES.iter().enumerate() {
                if let Some(index) = gl.get_uniform_block_index(program, name) {
                    gl.uniform_block_binding(program, index, slot as u32);
                }
            }

            self.next_program += 1;
            let id = ShaderId(self.next_program);
            self.programs.insert(id, program);
            Ok(id)
        }
    }

    pub fn delete_program(&mut self, id: ShaderId) {
        if let Some(program) = self.programs.remove(&id) {
            unsafe { self.gl.delete_program(program) };
        }
    }
}

impl GraphicsContext for GlowContext {
    fn caps(&self) -> ContextCaps {
        self.caps
    }

    fn set_depth_write(&mut self, enabled: bool) {
        unsafe { self.gl.depth_mask(enabled) };
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        unsafe { self.gl.depth_func(func.to_glow()) };
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        unsafe { self.gl.depth_range_f32(near, far) };
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        unsafe { self.gl.blend_equation(equation.to_glow()) };
    }

    fn set_blend_factors(&mut self, factors: BlendFactors) {
        unsafe {
            self.gl.blend_func_separate(
                factors.src_rgb.to_glow(),
                factors.dst_rgb.to_glow(),
                factors.src_alpha.to_glow(),
                factors.dst_alpha.to_glow(),
            );
        }
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        unsafe {
            match mode.to_glow() {
                Some(face) => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(face);
                }
                None => self.gl.disable(glow::CULL_FACE),
            }
        }
    }

    fn set_line_width(&mut self, width: f32) {
        unsafe { self.gl.line_width(width) };
    }

    fn set_line_smooth(&mut self, enabled: bool) {
        if !self.caps.native_line_smooth {
            return;
        }
        unsafe {
            if enabled {
                self.gl.enable(GL_LINE_SMOOTH);
            } else {
                self.gl.disable(GL_LINE_SMOOTH);
            }
        }
    }

    fn set_point_smooth(&mut self, enabled: bool) {
        if !self.caps.native_line_smooth {
            return;
        }
        unsafe {
            if enabled {
                self.gl.enable(GL_POINT_SMOOTH);
            } else {
                self.gl.disable(GL_POINT_SMOOTH);
            }
        }
    }

    fn set_point_size(&mut self, size: f32) {
        self.point_size = size;
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        unsafe { self.gl.clear_color(color[0], color[1], color[2], color[3]) };
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width, viewport.height);
        }
    }

    fn set_active_unit(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        let native = texture.and_then(|id| self.textures.get(&id).copied());
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, native) };
    }

    fn set_sampler_wrap_s(&mut self, wrap: WrapMode) {
        unsafe {
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap.to_glow() as i32);
        }
    }

    fn set_sampler_wrap_t(&mut self, wrap: WrapMode) {
        unsafe {
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap.to_glow() as i32);
        }
    }

    fn set_sampler_min_filter(&mut self, filter: FilterMode, mipmap: bool) {
        unsafe {
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                filter.to_glow_min(mipmap) as i32,
            );
        }
    }

    fn set_sampler_mag_filter(&mut self, filter: FilterMode) {
        unsafe {
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                filter.to_glow() as i32,
            );
        }
    }

    fn use_shader(&mut self, shader: Option<ShaderId>) {
        let native = shader.and_then(|id| self.programs.get(&id).copied());
        unsafe { self.gl.use_program(native) };
    }

    fn create_uniform_buffer(&mut self, size: usize) -> Result<UniformBufferId, GraphicsError> {
        unsafe {
            let buffer = self.gl.create_buffer().map_err(GraphicsError::Allocation)?;
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            self.gl
                .buffer_data_size(glow::UNIFORM_BUFFER, size as i32, glow::DYNAMIC_DRAW);
            self.next_uniform_buffer += 1;
            let id = UniformBufferId(self.next_uniform_buffer);
            self.uniform_buffers.insert(id, buffer);
            Ok(id)
        }
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: UniformBufferId) {
        let native = self.uniform_buffers.get(&buffer).copied();
        unsafe { self.gl.bind_buffer_base(glow::UNIFORM_BUFFER, slot, native) };
    }

    fn upload_uniform_block(&mut self, buffer: UniformBufferId, data: &[u8]) {
        let Some(&native) = self.uniform_buffers.get(&buffer) else {
            return;
        };
        unsafe {
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(native));
            self.gl
                .buffer_sub_data_u8_slice(glow::UNIFORM_BUFFER, 0, data);
        }
    }

    fn upload_stream(&mut self, vertex_bytes: &[u8], indices: &[u32]) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.stream_vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.stream_vbo));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, vertex_bytes, glow::STREAM_DRAW);
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.stream_ebo));
            self.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STREAM_DRAW,
            );
        }
    }

    fn draw_triangles(&mut self, index_count: u32) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.stream_vao));
            self.gl
                .draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_INT, 0);
        }
    }

    fn draw_line_strip(&mut self, vertex_count: u32) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.stream_vao));
            self.gl.draw_arrays(glow::LINE_STRIP, 0, vertex_count as i32);
        }
    }

    fn clear(&mut self, color: bool, depth: bool) {
        let mut mask = 0;
        if color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if mask != 0 {
            unsafe { self.gl.clear(mask) };
        }
    }

    fn read_pixels(&mut self, rect: Viewport) -> Vec<u8> {
        let byte_len = rect.width.max(0) as usize * rect.height.max(0) as usize * 4;
        let mut pixels = vec![0u8; byte_len];
        if byte_len == 0 {
            return pixels;
        }
        unsafe {
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            self.gl.read_pixels(
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(pixels.as_mut_slice())),
            );
        }
        pixels
    }

    fn insert_marker(&mut self) -> MarkerId {
        self.next_marker += 1;
        let id = MarkerId(self.next_marker);
        match unsafe { self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) } {
            Ok(fence) => {
                self.markers.insert(id, fence);
            }
            Err(err) => {
                // Unknown markers report signaled, so throughput degrades
                // gracefully to unsynchronized
                tracing::warn!(%err, "fence_sync failed");
            }
        }
        id
    }

    fn wait_marker(&mut self, marker: MarkerId, timeout_ns: u64) -> bool {
        let Some(fence) = self.markers.remove(&marker) else {
            return true;
        };
        let timeout = timeout_ns.min(i32::MAX as u64) as i32;
        let status = unsafe {
            self.gl
                .client_wait_sync(fence, glow::SYNC_FLUSH_COMMANDS_BIT, timeout)
        };
        unsafe { self.gl.delete_sync(fence) };
        status == glow::ALREADY_SIGNALED || status == glow::CONDITION_SATISFIED
    }
}

impl Drop for GlowContext {
    fn drop(&mut self) {
        unsafe {
            for (_, fence) in self.markers.drain() {
                self.gl.delete_sync(fence);
            }
            for (_, buffer) in self.uniform_buffers.drain() {
                self.gl.delete_buffer(buffer);
            }
            for (_, texture) in self.textures.drain() {
                self.gl.delete_texture(texture);
            }
            for (_, program) in self.programs.drain() {
                self.gl.delete_program(program);
            }
            self.gl.delete_buffer(self.stream_ebo);
            self.gl.delete_buffer(self.stream_vbo);
            self.gl.delete_vertex_array(self.stream_vao);
        }
    }
}

/// Vertex layout of `StreamVertex`: position, normalized byte color, uv.
unsafe fn bind_stream_layout(gl: &glow::Context) {
    let stride = STREAM_VERTEX_STRIDE as i32;
    unsafe {
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 4, glow::UNSIGNED_BYTE, true, stride, 12);
        gl.enable_vertex_attrib_array(2);
        gl.vertex_attrib_pointer_f32(2, 2, glow::FLOAT, false, stride, 16);
    }
}

unsafe fn apply_sampler(gl: &glow::Context, sampler: &SamplerState) {
    unsafe {
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_S,
            sampler.wrap_s.to_glow() as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_T,
            sampler.wrap_t.to_glow() as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MIN_FILTER,
            sampler.min_filter.to_glow_min(sampler.mipmap) as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MAG_FILTER,
            sampler.mag_filter.to_glow() as i32,
        );
    }
}

/// One packed mesh's index range in the shared element buffer
#[derive(Debug, Clone, Copy)]
struct MeshRange {
    first_index: usize,
    index_count: usize,
}

/// Static compiled geometry: all meshes packed into one VBO/EBO pair with
/// static usage, drawn per mesh as one indexed range.
pub struct GlGeometryBuffer {
    gl: Arc<glow::Context>,
    vao: Option<glow::VertexArray>,
    vbo: Option<glow::Buffer>,
    ebo: Option<glow::Buffer>,
    ranges: Vec<MeshRange>,
}

impl GlGeometryBuffer {
    pub fn new(gl: Arc<glow::Context>) -> Self {
        Self {
            gl,
            vao: None,
            vbo: None,
            ebo: None,
            ranges: Vec::new(),
        }
    }

    fn release(&mut self) {
        unsafe {
            if let Some(ebo) = self.ebo.take() {
                self.gl.delete_buffer(ebo);
            }
            if let Some(vbo) = self.vbo.take() {
                self.gl.delete_buffer(vbo);
            }
            if let Some(vao) = self.vao.take() {
                self.gl.delete_vertex_array(vao);
            }
        }
        self.ranges.clear();
    }
}

impl GeometryBuffer for GlGeometryBuffer {
    fn upload(&mut self, meshes: &[MeshData]) -> Result<(), GraphicsError> {
        self.release();

        let mut vertices: Vec<StreamVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        for mesh in meshes {
            let base = vertices.len() as u32;
            let first_index = indices.len();
            vertices.extend(mesh.vertices.iter().map(StreamVertex::from));
            indices.extend(mesh.indices.iter().map(|i| i + base));
            self.ranges.push(MeshRange {
                first_index,
                index_count: mesh.indices.len(),
            });
        }

        unsafe {
            let vao = self.gl.create_vertex_array().map_err(GraphicsError::Allocation)?;
            let vbo = self.gl.create_buffer().map_err(GraphicsError::Allocation)?;
            let ebo = self.gl.create_buffer().map_err(GraphicsError::Allocation)?;

            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&vertices),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            self.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&indices),
                glow::STATIC_DRAW,
            );
            bind_stream_layout(&self.gl);
            self.gl.bind_vertex_array(None);

            self.vao = Some(vao);
            self.vbo = Some(vbo);
            self.ebo = Some(ebo);
        }
        Ok(())
    }

    fn draw(&mut self, mesh_index: usize) {
        let Some(vao) = self.vao else {
            return;
        };
        let Some(range) = self.ranges.get(mesh_index).copied() else {
            return;
        };
        if range.index_count == 0 {
            return;
        }
        unsafe {
            self.gl.bind_vertex_array(Some(vao));
            self.gl.draw_elements(
                glow::TRIANGLES,
                range.index_count as i32,
                glow::UNSIGNED_INT,
                (range.first_index * std::mem::size_of::<u32>()) as i32,
            );
        }
    }

    fn invalidate(&mut self) {
        // Context is gone; the handles are dead, don't call delete on them
        self.vao = None;
        self.vbo = None;
        self.ebo = None;
        self.ranges.clear();
    }
}

impl Drop for GlGeometryBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
