//! Eviction policy applied when a [`crate::packet_queue::PacketQueue`] is full.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropPolicy {
    /// Evict the oldest packet to make room for the new one.
    Head,
    /// Reject the newest packet; the incoming enqueue fails.
    Tail,
    /// Never evict; enqueue fails instead once the queue is at capacity.
    NoDrop,
}

impl Default for DropPolicy {
    fn default() -> Self {
        DropPolicy::Head
    }
}
