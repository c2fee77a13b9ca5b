//! Sequence-number reorder tolerance for QLAM receipt.

use crate::constants::SEQ_REORDER_WINDOW;

/// Tracks the most recently accepted sequence number for one neighbor and
/// decides whether a newly-received frame is stale.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeqTracker {
    last_accepted: Option<u16>,
}

impl SeqTracker {
    pub fn new() -> Self {
        SeqTracker { last_accepted: None }
    }

    /// True if `seq` is the same as, or within the 128-entry "before"
    /// window behind, the last accepted sequence number — i.e. should be
    /// discarded without mutating state.
    pub fn is_stale(&self, seq: u16) -> bool {
        match self.last_accepted {
            None => false,
            Some(last) => {
                let behind = last.wrapping_sub(seq);
                behind <= SEQ_REORDER_WINDOW
            }
        }
    }

    /// Accept `seq` as the new high-water mark. Caller must have already
    /// checked `is_stale` is false.
    pub fn accept(&mut self, seq: u16) {
        self.last_accepted = Some(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_never_stale() {
        let t = SeqTracker::new();
        assert!(!t.is_stale(0));
        assert!(!t.is_stale(12345));
    }

    #[test]
    fn replay_of_same_seq_is_stale() {
        let mut t = SeqTracker::new();
        t.accept(100);
        assert!(t.is_stale(100));
    }

    #[test]
    fn within_window_behind_is_stale() {
        let mut t = SeqTracker::new();
        t.accept(200);
        assert!(t.is_stale(199));
        assert!(t.is_stale(200 - 128));
        assert!(!t.is_stale(200 - 129));
    }

    #[test]
    fn ahead_is_fresh() {
        let mut t = SeqTracker::new();
        t.accept(200);
        assert!(!t.is_stale(201));
        assert!(!t.is_stale(1000));
    }

    #[test]
    fn wraparound_ahead_is_fresh() {
        let mut t = SeqTracker::new();
        t.accept(65535);
        assert!(!t.is_stale(0));
        assert!(!t.is_stale(1));
    }
}
