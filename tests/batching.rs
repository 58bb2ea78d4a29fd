//! Integration tests for draw batching through the renderer
//!
//! Drives the full pipeline (state -> topology expansion -> batch -> flush)
//! against the recording sink and asserts on the exact calls the GPU would
//! have heard.

use kiln::context::Call;
use kiln::vertex::STREAM_VERTEX_STRIDE;
use kiln::{LogicalGPUState, Renderer, SamplerState, TextureId, TraceContext, Vertex};

fn quad(x: f32, y: f32) -> Vec<Vertex> {
    vec![
        Vertex::xy(x, y),
        Vertex::xy(x + 1.0, y),
        Vertex::xy(x + 1.0, y + 1.0),
        Vertex::xy(x, y + 1.0),
    ]
}

#[test]
fn test_batching_transparency() {
    // N quads under one state must produce exactly one draw call spanning
    // 6N indices over 4N vertices
    let n = 10u32;
    let mut renderer = Renderer::new(TraceContext::new());
    for i in 0..n {
        renderer.draw_quads(&quad(i as f32, 0.0));
    }
    renderer.flush_command_queue();

    let ctx = renderer.context();
    assert_eq!(
        ctx.count(|c| matches!(c, Call::DrawTriangles(_))),
        1,
        "all quads must collapse into one draw"
    );
    assert_eq!(ctx.count(|c| matches!(c, Call::DrawTriangles(60))), 1);
    assert_eq!(
        ctx.count(|c| matches!(
            c,
            Call::UploadStream { vertex_bytes, index_count }
                if *vertex_bytes == 40 * STREAM_VERTEX_STRIDE && *index_count == 60
        )),
        1,
        "one streaming upload carrying 4N vertices and 6N indices"
    );
}

#[test]
fn test_redundant_state_sets_do_not_break_batches() {
    // The legacy pattern: set the same state before every draw
    let mut renderer = Renderer::new(TraceContext::new());
    let texture = TextureId(1);
    renderer.register_texture(texture, SamplerState::default());

    for i in 0..5 {
        let mut state = LogicalGPUState::default();
        state.bind_texture(0, texture, SamplerState::default());
        renderer.set_state(state);
        renderer.draw_quads(&quad(i as f32, 0.0));
    }
    renderer.flush_command_queue();

    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::DrawTriangles(30))),
        1
    );
    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::BindTexture(_))),
        1,
        "equivalent rebinds must not reach the sink"
    );
}

#[test]
fn test_state_change_splits_batches() {
    let mut renderer = Renderer::new(TraceContext::new());
    renderer.draw_quads(&quad(0.0, 0.0));

    let mut wide = LogicalGPUState::default();
    wide.global.line_width = 4.0;
    renderer.set_state(wide);
    renderer.draw_quads(&quad(1.0, 0.0));
    renderer.flush_command_queue();

    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::DrawTriangles(6))),
        2,
        "a non-equivalent state must split the batch in two"
    );
}

#[test]
fn test_mixed_topologies_share_one_batch() {
    let mut renderer = Renderer::new(TraceContext::new());
    renderer.draw_quads(&quad(0.0, 0.0));
    renderer.draw_triangle_fan(&[
        Vertex::xy(0.0, 0.0),
        Vertex::xy(1.0, 0.0),
        Vertex::xy(1.0, 1.0),
        Vertex::xy(0.0, 1.0),
    ]);
    renderer.draw_triangle_strip(&[
        Vertex::xy(2.0, 0.0),
        Vertex::xy(3.0, 0.0),
        Vertex::xy(2.0, 1.0),
        Vertex::xy(3.0, 1.0),
    ]);
    renderer.flush_command_queue();

    // 6 (quad) + 6 (fan of 4) + 6 (strip of 4) indices in one draw
    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::DrawTriangles(18))),
        1
    );
}

#[test]
fn test_symmetric_quad_strip_through_renderer() {
    let mut renderer = Renderer::new(TraceContext::new());
    let six: Vec<Vertex> = (0..6).map(|i| Vertex::xy(i as f32, 0.0)).collect();
    renderer.draw_symmetric_quad_strip(&six);
    renderer.flush_command_queue();
    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::DrawTriangles(12))),
        1,
        "six vertices form exactly four triangles"
    );

    // Five vertices are below the topology minimum and draw nothing
    renderer.context_mut().clear_calls();
    renderer.draw_symmetric_quad_strip(&six[..5]);
    renderer.flush_command_queue();
    assert!(renderer.context().calls().is_empty());
}

#[test]
fn test_degenerate_inputs_never_reach_the_sink() {
    let mut renderer = Renderer::new(TraceContext::new());
    renderer.draw_quads(&[]);
    renderer.draw_quads(&quad(0.0, 0.0)[..3]);
    renderer.draw_triangles(&quad(0.0, 0.0)[..2]);
    renderer.draw_line_strip(&[Vertex::xy(0.0, 0.0)]);
    renderer.flush_command_queue();
    assert!(renderer.context().calls().is_empty());
}

#[test]
fn test_marker_ring_bounds_in_flight_flushes() {
    let mut renderer = Renderer::new(TraceContext::new());
    // Default ring depth is 3: the first three flushes must not wait
    for i in 0..3 {
        renderer.draw_quads(&quad(i as f32, 0.0));
        let mut state = LogicalGPUState::default();
        state.global.line_width = i as f32 + 2.0;
        renderer.set_state(state);
    }
    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::WaitMarker(..))),
        0
    );
    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::InsertMarker(_))),
        3
    );

    // The fourth flush waits on the oldest marker first
    renderer.draw_quads(&quad(9.0, 0.0));
    renderer.flush_command_queue();
    assert_eq!(
        renderer
            .context()
            .count(|c| matches!(c, Call::WaitMarker(kiln::MarkerId(1), _))),
        1
    );
}
