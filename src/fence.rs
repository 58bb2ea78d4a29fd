//! Completion-marker ring
//!
//! The stream buffers are reused every flush, so before rewriting them the
//! renderer bounds how much GPU work can still be in flight: a small ring of
//! completion markers, one inserted after each draw. When the ring is full
//! the oldest marker is waited on with a fixed advisory timeout. Expiry does
//! not fail the operation; the write proceeds anyway, trading determinism
//! for never draining the whole pipeline.

use std::collections::VecDeque;

use crate::context::{GraphicsContext, MarkerId};

/// Default cap on outstanding markers
pub const DEFAULT_RING_DEPTH: usize = 3;

/// Default advisory wait: one 60 Hz frame period
pub const DEFAULT_MARKER_TIMEOUT_NS: u64 = 16_000_000;

#[derive(Debug)]
pub struct MarkerRing {
    pending: VecDeque<MarkerId>,
    depth: usize,
    timeout_ns: u64,
}

impl Default for MarkerRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_DEPTH, DEFAULT_MARKER_TIMEOUT_NS)
    }
}

impl MarkerRing {
    pub fn new(depth: usize, timeout_ns: u64) -> Self {
        Self {
            pending: VecDeque::with_capacity(depth.max(1)),
            depth: depth.max(1),
            timeout_ns,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Bounded wait before the stream buffers are rewritten: drain the ring
    /// down below its cap, waiting on the oldest markers first.
    pub fn before_buffer_reuse<C: GraphicsContext>(&mut self, ctx: &mut C) {
        while self.pending.len() >= self.depth {
            let Some(marker) = self.pending.pop_front() else {
                break;
            };
            if !ctx.wait_marker(marker, self.timeout_ns) {
                tracing::warn!(
                    ?marker,
                    timeout_ns = self.timeout_ns,
                    "completion marker timed out, proceeding without wait guarantee"
                );
            }
        }
    }

    /// Insert a marker after a GPU draw was issued.
    pub fn signal<C: GraphicsContext>(&mut self, ctx: &mut C) {
        let marker = ctx.insert_marker();
        self.pending.push_back(marker);
    }

    /// Forget all outstanding markers; used on context loss.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Call, TraceContext};

    #[test]
    fn test_no_wait_below_cap() {
        let mut ring = MarkerRing::new(3, 1_000);
        let mut ctx = TraceContext::new();
        ring.signal(&mut ctx);
        ring.signal(&mut ctx);
        ring.before_buffer_reuse(&mut ctx);
        assert_eq!(ctx.count(|c| matches!(c, Call::WaitMarker(..))), 0);
        assert_eq!(ring.outstanding(), 2);
    }

    #[test]
    fn test_waits_on_oldest_when_full() {
        let mut ring = MarkerRing::new(2, 1_000);
        let mut ctx = TraceContext::new();
        ring.signal(&mut ctx);
        ring.signal(&mut ctx);
        ring.before_buffer_reuse(&mut ctx);
        let waits: Vec<_> = ctx
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::WaitMarker(..)))
            .collect();
        assert_eq!(waits.len(), 1);
        assert_eq!(waits[0], &Call::WaitMarker(MarkerId(1), 1_000));
        assert_eq!(ring.outstanding(), 1);
    }

    #[test]
    fn test_timeout_proceeds_without_error() {
        let mut ring = MarkerRing::new(1, 1_000);
        let mut ctx = TraceContext::new();
        ctx.wait_signaled = false;
        ring.signal(&mut ctx);
        // Must not panic or retry; the marker is simply dropped
        ring.before_buffer_reuse(&mut ctx);
        assert_eq!(ring.outstanding(), 0);
    }

    #[test]
    fn test_reset_clears_outstanding() {
        let mut ring = MarkerRing::new(2, 1_000);
        let mut ctx = TraceContext::new();
        ring.signal(&mut ctx);
        ring.reset();
        assert_eq!(ring.outstanding(), 0);
        ring.before_buffer_reuse(&mut ctx);
        assert_eq!(ctx.count(|c| matches!(c, Call::WaitMarker(..))), 0);
    }
}
