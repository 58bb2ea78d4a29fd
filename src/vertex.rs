//! Vertex layouts
//!
//! `Vertex` is the caller-facing vertex; `StreamVertex` is the packed GPU
//! layout the batch uploads. Legacy callers hand colors over in BGRA byte
//! order; `Vertex::from_bgra` normalizes to the RGBA channel order the
//! shaders expect.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Caller-facing vertex for immediate-mode draws
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    /// RGBA, 8 bits per channel
    pub color: [u8; 4],
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, color: [u8; 4], uv: Vec2) -> Self {
        Self { position, color, uv }
    }

    /// Construct from a legacy BGRA color, swizzling to RGBA.
    pub fn from_bgra(position: Vec3, bgra: [u8; 4], uv: Vec2) -> Self {
        Self {
            position,
            color: [bgra[2], bgra[1], bgra[0], bgra[3]],
            uv,
        }
    }

    /// Flat 2D helper: position in the XY plane, z = 0.
    pub fn xy(x: f32, y: f32) -> Self {
        Self {
            position: Vec3::new(x, y, 0.0),
            color: [255, 255, 255, 255],
            uv: Vec2::ZERO,
        }
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: [255, 255, 255, 255],
            uv: Vec2::ZERO,
        }
    }
}

/// Packed vertex layout uploaded to the GPU (24 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StreamVertex {
    pub position: [f32; 3],
    /// RGBA8, normalized in the vertex attribute
    pub color: [u8; 4],
    pub uv: [f32; 2],
}

impl From<&Vertex> for StreamVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: v.position.to_array(),
            color: v.color,
            uv: v.uv.to_array(),
        }
    }
}

/// Byte stride of one packed vertex
pub const STREAM_VERTEX_STRIDE: usize = std::mem::size_of::<StreamVertex>();
