//! Primitive-to-triangle expansion
//!
//! The batch only ever draws indexed triangle lists, so every legacy
//! topology expands to flat triangle indices here. Expansion functions take
//! a vertex count and return indices local to that draw; the batch rebases
//! them when appending.
//!
//! Degenerate inputs (fewer vertices than the topology minimum) expand to
//! zero indices. That is deliberate: real call sites submit empty or
//! near-empty arrays to suppress a draw, so short inputs are a silent no-op,
//! not an error.

use glam::{Vec2, Vec3};

use crate::vertex::Vertex;

/// Sides of the filled polygon rounding each joint of a degraded line strip
const JOINT_SEGMENTS: u32 = 32;

/// Quad list: groups of 4 vertices (a, b, c, d) -> {a,b,c, c,d,a}.
pub fn quad_list(vertex_count: usize) -> Vec<u32> {
    if vertex_count < 4 {
        return Vec::new();
    }
    let quads = vertex_count / 4;
    let mut indices = Vec::with_capacity(quads * 6);
    for q in 0..quads as u32 {
        let base = q * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    indices
}

/// Quad strip: step 2 up to n-2, {i+1,i,i+2, i+1,i+2,i+3}.
pub fn quad_strip(vertex_count: usize) -> Vec<u32> {
    if vertex_count < 4 {
        return Vec::new();
    }
    let mut indices = Vec::with_capacity((vertex_count - 2) * 3);
    let mut i = 0u32;
    while (i as usize) + 3 < vertex_count {
        indices.extend_from_slice(&[i + 1, i, i + 2, i + 1, i + 2, i + 3]);
        i += 2;
    }
    indices
}

/// Symmetric quad strip (ribbon/diamond topology, stride 3): per stride
/// group emit {1,3,0},{1,4,3},{1,5,4},{1,2,5} relative to the group's base.
/// Needs one full group plus at least one following group (>= 6 vertices).
pub fn symmetric_quad_strip(vertex_count: usize) -> Vec<u32> {
    if vertex_count < 6 {
        return Vec::new();
    }
    let mut indices = Vec::new();
    let mut base = 0u32;
    while (base as usize) + 5 < vertex_count {
        indices.extend_from_slice(&[
            base + 1, base + 3, base,
            base + 1, base + 4, base + 3,
            base + 1, base + 5, base + 4,
            base + 1, base + 2, base + 5,
        ]);
        base += 3;
    }
    indices
}

/// Triangle fan: {0, i, i+1} for i in 1..n-1.
pub fn triangle_fan(vertex_count: usize) -> Vec<u32> {
    if vertex_count < 3 {
        return Vec::new();
    }
    let mut indices = Vec::with_capacity((vertex_count - 2) * 3);
    for i in 1..(vertex_count as u32 - 1) {
        indices.extend_from_slice(&[0, i, i + 1]);
    }
    indices
}

/// Triangle strip with alternating winding so every triangle faces the same
/// way.
pub fn triangle_strip(vertex_count: usize) -> Vec<u32> {
    if vertex_count < 3 {
        return Vec::new();
    }
    let mut indices = Vec::with_capacity((vertex_count - 2) * 3);
    for i in 0..(vertex_count as u32 - 2) {
        if i % 2 == 0 {
            indices.extend_from_slice(&[i, i + 1, i + 2]);
        } else {
            indices.extend_from_slice(&[i + 1, i, i + 2]);
        }
    }
    indices
}

/// Triangle list passthrough; trailing vertices that don't complete a
/// triangle are dropped.
pub fn triangle_list(vertex_count: usize) -> Vec<u32> {
    if vertex_count < 3 {
        return Vec::new();
    }
    (0..(vertex_count - vertex_count % 3) as u32).collect()
}

/// Degrade a line strip to triangle geometry when the context has no native
/// smooth lines: per segment a thin quad extruded along the segment's
/// perpendicular by half the line width, plus a filled polygon at each
/// vertex to round the joints.
pub fn expand_line_strip(vertices: &[Vertex], line_width: f32) -> (Vec<Vertex>, Vec<u32>) {
    if vertices.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let half = (line_width * 0.5).max(0.5);
    let mut out_vertices = Vec::new();
    let mut out_indices = Vec::new();

    for pair in vertices.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let dir = (b.position - a.position).truncate();
        let len = dir.length();
        if len <= f32::EPSILON {
            continue;
        }
        let perp = Vec2::new(-dir.y, dir.x) / len * half;
        let offset = Vec3::new(perp.x, perp.y, 0.0);

        let base = out_vertices.len() as u32;
        out_vertices.push(Vertex { position: a.position + offset, ..*a });
        out_vertices.push(Vertex { position: b.position + offset, ..*b });
        out_vertices.push(Vertex { position: b.position - offset, ..*b });
        out_vertices.push(Vertex { position: a.position - offset, ..*a });
        out_indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    for v in vertices {
        let center = out_vertices.len() as u32;
        out_vertices.push(*v);
        for i in 0..JOINT_SEGMENTS {
            let angle = (i as f32) / (JOINT_SEGMENTS as f32) * std::f32::consts::TAU;
            let rim = Vec3::new(angle.cos() * half, angle.sin() * half, 0.0);
            out_vertices.push(Vertex { position: v.position + rim, ..*v });
        }
        for i in 0..JOINT_SEGMENTS {
            let next = (i + 1) % JOINT_SEGMENTS;
            out_indices.extend_from_slice(&[center, center + 1 + i, center + 1 + next]);
        }
    }

    (out_vertices, out_indices)
}
