//! Reorder buffer: releases worker results in canonical-stream order.
//!
//! Completions arrive keyed by their position in the canonical sequence and
//! are held until every predecessor has been released. Capacity counts
//! dispatched-but-not-released positions, which is what bounds orchestrator
//! memory regardless of how far the fastest worker runs ahead.

use std::collections::BTreeMap;

use crate::types::ProcessingResult;

/// Bounded pending-slot buffer keyed by canonical position.
pub struct ReorderBuffer {
    pending: BTreeMap<u64, ProcessingResult>,
    /// Next position to hand to the caller.
    next_release: u64,
    /// Positions dispatched to workers but not yet released.
    in_flight: usize,
    capacity: usize,
}

impl ReorderBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reorder capacity must be positive");
        Self {
            pending: BTreeMap::new(),
            next_release: 0,
            in_flight: 0,
            capacity,
        }
    }

    /// True when no more work may be dispatched until the head releases.
    pub fn is_full(&self) -> bool {
        self.in_flight >= self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn next_release(&self) -> u64 {
        self.next_release
    }

    /// Record a dispatch. Call before handing the position to a worker.
    pub fn mark_dispatched(&mut self) {
        self.in_flight += 1;
    }

    /// Accept a completion at `pos`. Positions are unique per dispatch.
    pub fn complete(&mut self, pos: u64, result: ProcessingResult) {
        debug_assert!(pos >= self.next_release, "completion for released position");
        self.pending.insert(pos, result);
    }

    /// Release the next result if the contiguous prefix has reached it.
    pub fn pop_ready(&mut self) -> Option<ProcessingResult> {
        let result = self.pending.remove(&self.next_release)?;
        self.next_release += 1;
        self.in_flight -= 1;
        Some(result)
    }
}
