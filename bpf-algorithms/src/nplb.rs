//! No Packet Left Behind: the alternative to ASAP.
//!
//! Adds a delay term to the destination's *advertised* queue depth instead
//! of adding real synthetic bytes to a queue. Mutually exclusive with ASAP
//! per bin (component design §4.8) — a `BinQueueMgr` configures exactly one
//! of the two.

/// Weight applied to accumulated queuing delay (microseconds) to turn it
/// into an advertised-depth bias, proportional to drain rate so a
/// fast-draining destination isn't over-boosted.
const BASE_WEIGHT_BYTES_PER_US: f64 = 0.01;

pub struct NplbState {
    accumulated_delay_us: u64,
    drain_rate_bps: f64,
}

impl NplbState {
    pub fn new() -> Self {
        NplbState {
            accumulated_delay_us: 0,
            drain_rate_bps: 0.0,
        }
    }

    pub fn update_drain_rate(&mut self, bps: f64) {
        self.drain_rate_bps = bps;
    }

    /// The byte bias to add to this destination's advertised depth.
    pub fn delay_term_bytes(&self) -> u32 {
        let weight = BASE_WEIGHT_BYTES_PER_US * (1.0 + self.drain_rate_bps / 1_000_000.0).recip().max(0.1);
        ((self.accumulated_delay_us as f64) * weight) as u32
    }

    /// Call when the head-of-line packet's dwell time is known (e.g. every
    /// tick), to keep the accumulated delay current.
    pub fn observe_head_of_line_dwell(&mut self, dwell_us: u64) {
        self.accumulated_delay_us = dwell_us;
    }

    /// Call after a dequeue with the dequeued packet's total dwell time and
    /// the new head-of-line packet's dwell-so-far. Returns the number of
    /// zombie bytes to inject to drive queuing delay back down, if the
    /// dwell delta exceeded `stickiness_threshold_us`.
    pub fn on_dequeue(
        &mut self,
        dequeued_dwell_us: u64,
        next_head_dwell_so_far_us: u64,
        stickiness_threshold_us: u64,
        zombie_size_bytes: u32,
    ) -> Option<u32> {
        self.accumulated_delay_us = next_head_dwell_so_far_us;
        let delta = dequeued_dwell_us.saturating_sub(next_head_dwell_so_far_us);
        if delta > stickiness_threshold_us {
            Some(zombie_size_bytes)
        } else {
            None
        }
    }
}

impl Default for NplbState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_term_scales_with_accumulated_delay() {
        let mut nplb = NplbState::new();
        nplb.observe_head_of_line_dwell(0);
        let a = nplb.delay_term_bytes();
        nplb.observe_head_of_line_dwell(100_000);
        let b = nplb.delay_term_bytes();
        assert!(b > a);
    }

    #[test]
    fn large_dwell_delta_triggers_injection() {
        let mut nplb = NplbState::new();
        let result = nplb.on_dequeue(50_000, 0, 10_000, 1000);
        assert_eq!(result, Some(1000));
    }

    #[test]
    fn small_dwell_delta_does_not_trigger() {
        let mut nplb = NplbState::new();
        let result = nplb.on_dequeue(5_000, 4_000, 10_000, 1000);
        assert_eq!(result, None);
    }
}
