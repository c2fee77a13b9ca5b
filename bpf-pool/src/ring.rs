//! Process-local free-slot ring.
//!
//! A plain bounded deque of free arena indices. `PacketPool::get` pops from
//! here first; when empty it refills a batch from the shared ring (or, with
//! the `shared-memory` feature disabled, simply reports exhaustion once both
//! the local ring and the arena's own unallocated tail are empty).

use std::collections::VecDeque;

/// Default local ring capacity, per the component design's "~1024".
pub const LOCAL_RING_CAPACITY: usize = 1024;

/// Batch size moved between the local ring and the shared ring on refill/spill.
pub const REFILL_BATCH: usize = 128;

pub struct LocalRing {
    free: VecDeque<u32>,
    capacity: usize,
}

impl LocalRing {
    pub fn new(capacity: usize) -> Self {
        LocalRing {
            free: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free.len() >= self.capacity
    }

    #[inline]
    pub fn pop(&mut self) -> Option<u32> {
        self.free.pop_front()
    }

    #[inline]
    pub fn push(&mut self, idx: u32) {
        self.free.push_back(idx);
    }

    /// Drain up to `n` indices, for spilling a batch back to the shared ring.
    pub fn drain_batch(&mut self, n: usize) -> Vec<u32> {
        let n = n.min(self.free.len());
        self.free.drain(..n).collect()
    }

    /// Absorb a batch refilled from the shared ring.
    pub fn extend_batch(&mut self, batch: impl IntoIterator<Item = u32>) {
        self.free.extend(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_push_roundtrip() {
        let mut ring = LocalRing::new(4);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_at_capacity() {
        let mut ring = LocalRing::new(2);
        ring.push(1);
        ring.push(2);
        assert!(ring.is_full());
    }

    #[test]
    fn drain_batch_caps_at_len() {
        let mut ring = LocalRing::new(8);
        for i in 0..3 {
            ring.push(i);
        }
        let drained = ring.drain_batch(10);
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(ring.is_empty());
    }
}
