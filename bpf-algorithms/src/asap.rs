//! Anti-Starvation with Artificial Packets.
//!
//! On each forwarding tick, if a destination's head-of-line packet has been
//! waiting an unusually long time and there is no gradient-based reason to
//! serve it yet, injects synthetic bytes so the destination's gradient grows
//! until arbitration picks it. Growth is quadratic in the wait time and
//! bounded by a gradient-based cap recomputed whenever the scheduler reports
//! updated gradients.

use crate::clock::Timestamp;
use std::collections::HashMap;
use std::time::Duration;

/// Ticks further apart than this are assumed to be process-level
/// preemption, not real starvation; the whole cycle is skipped.
pub const MAX_TICK_GAP: Duration = Duration::from_millis(10);
/// The expected steady-state tick period, used to compute how much of a
/// long gap to credit to `sleep_time_accumulated` rather than to starvation.
pub const EXPECTED_TICK: Duration = Duration::from_millis(5);
/// Tuning constant for the quadratic starvation-byte growth curve. Chosen,
/// like the fast-recovery thresholds in `zlr`, as a fixed engineering
/// constant rather than derived from link capacity.
pub const ASZ_COEFFICIENT: f64 = 2.0;
/// Minimum starvation injection: 50ms worth of bytes at the average
/// path-controller capacity.
pub const MIN_STARVATION_MS: f64 = 50.0;

#[derive(Debug, Default)]
struct CapacityTable {
    estimates: HashMap<u32, u64>,
    average_bps: u64,
}

impl CapacityTable {
    fn update(&mut self, pc_num: u32, bps: u64) {
        self.estimates.insert(pc_num, bps);
        let nonzero: Vec<u64> = self.estimates.values().copied().filter(|v| *v > 0).collect();
        self.average_bps = if nonzero.is_empty() {
            0
        } else {
            nonzero.iter().sum::<u64>() / nonzero.len() as u64
        };
    }
}

/// The quadratic-growth coefficient and starvation floor an `AsapState` is
/// built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsapTuning {
    pub coefficient: f64,
    pub min_starvation_ms: f64,
}

impl Default for AsapTuning {
    fn default() -> Self {
        AsapTuning { coefficient: ASZ_COEFFICIENT, min_starvation_ms: MIN_STARVATION_MS }
    }
}

pub struct AsapState {
    coefficient: f64,
    min_starvation_ms: f64,
    sleep_time_accumulated: Duration,
    time_of_last_asap_call: Option<Timestamp>,
    time_of_last_dequeue: Option<Timestamp>,
    delay_bytes_added: u32,
    gradient_based_cap: u32,
    gradient_based_ls_cap: u32,
    capacity: CapacityTable,
}

impl AsapState {
    pub fn new() -> Self {
        Self::with_tuning(AsapTuning::default())
    }

    pub fn with_tuning(tuning: AsapTuning) -> Self {
        AsapState {
            coefficient: tuning.coefficient,
            min_starvation_ms: tuning.min_starvation_ms,
            sleep_time_accumulated: Duration::ZERO,
            time_of_last_asap_call: None,
            time_of_last_dequeue: None,
            delay_bytes_added: 0,
            gradient_based_cap: u32::MAX,
            gradient_based_ls_cap: u32::MAX,
            capacity: CapacityTable::default(),
        }
    }

    pub fn delay_bytes_added(&self) -> u32 {
        self.delay_bytes_added
    }

    pub fn update_capacity(&mut self, pc_num: u32, bps: u64) {
        self.capacity.update(pc_num, bps);
    }

    /// Recompute the cap: the minimum byte count that would make this
    /// destination's gradient strictly exceed `current_max_gradient`, plus
    /// a small hysteresis margin.
    pub fn update_gradient_cap(&mut self, this_gradient: i64, current_max_gradient: i64, hysteresis: u32, is_ls: bool) {
        let needed = (current_max_gradient - this_gradient).max(0) as u32 + hysteresis;
        if is_ls {
            self.gradient_based_ls_cap = needed;
        } else {
            self.gradient_based_cap = needed;
        }
    }

    /// Run one tick. `head_of_line_recv_time` and `is_ls` describe the
    /// destination's current head-of-line packet, if any; `capacity_share`
    /// is this destination's share of average capacity in bytes/sec.
    /// Returns the number of *additional* zombie bytes to inject this tick,
    /// or 0.
    pub fn tick(
        &mut self,
        now: Timestamp,
        head_of_line_recv_time: Option<Timestamp>,
        capacity_share_bps: f64,
        is_ls: bool,
    ) -> u32 {
        if let Some(last) = self.time_of_last_asap_call {
            let gap = now.saturating_sub(last);
            if gap > MAX_TICK_GAP {
                self.sleep_time_accumulated += gap.saturating_sub(EXPECTED_TICK);
                self.time_of_last_asap_call = Some(now);
                return 0;
            }
        }
        self.time_of_last_asap_call = Some(now);

        let Some(hol_recv) = head_of_line_recv_time else {
            return 0;
        };
        let since_dequeue = self.time_of_last_dequeue.map(|t| now.saturating_sub(t)).unwrap_or(now);
        let since_recv = now.saturating_sub(hol_recv);
        let delay = since_dequeue.min(since_recv);
        let delay_s = delay.as_secs_f64();

        let min_bytes = (self.min_starvation_ms / 1000.0) * capacity_share_bps;
        let quadratic = self.coefficient * delay_s * delay_s * capacity_share_bps;
        let cap = if is_ls { self.gradient_based_ls_cap } else { self.gradient_based_cap };
        let bytes_target = quadratic.max(min_bytes).ceil() as u32;
        let bytes_target = bytes_target.min(cap);

        if bytes_target > self.delay_bytes_added {
            let inject = bytes_target - self.delay_bytes_added;
            self.delay_bytes_added = bytes_target;
            inject
        } else {
            0
        }
    }

    pub fn on_dequeue(&mut self, now: Timestamp) {
        self.delay_bytes_added = 0;
        self.sleep_time_accumulated = Duration::ZERO;
        self.time_of_last_dequeue = Some(now);
    }
}

impl Default for AsapState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_injection_without_head_of_line() {
        let mut asap = AsapState::new();
        let bytes = asap.tick(Timestamp::from_millis(0), None, 1_000_000.0, false);
        assert_eq!(bytes, 0);
    }

    #[test]
    fn grows_quadratically_and_caps() {
        let mut asap = AsapState::new();
        asap.gradient_based_cap = 10_000;
        let recv = Timestamp::from_millis(0);
        let mut t = Timestamp::from_millis(0);
        asap.tick(t, Some(recv), 0.0, false); // prime last-call

        let mut totals = Vec::new();
        for ms in [10, 20, 40, 80, 160, 2000] {
            t = Timestamp::from_millis(ms);
            asap.tick(t, Some(recv), 1_000_000.0, false);
            totals.push(asap.delay_bytes_added());
        }
        // monotonically non-decreasing
        for w in totals.windows(2) {
            assert!(w[1] >= w[0]);
        }
        // capped
        assert!(*totals.last().unwrap() <= 10_000);
    }

    #[test]
    fn dequeue_resets_accounting() {
        let mut asap = AsapState::new();
        asap.gradient_based_cap = 100_000;
        let recv = Timestamp::from_millis(0);
        asap.tick(Timestamp::from_millis(0), Some(recv), 0.0, false);
        asap.tick(Timestamp::from_millis(500), Some(recv), 1_000_000.0, false);
        assert!(asap.delay_bytes_added() > 0);
        asap.on_dequeue(Timestamp::from_millis(500));
        assert_eq!(asap.delay_bytes_added(), 0);
    }

    #[test]
    fn large_tick_gap_credits_sleep_time_and_skips() {
        let mut asap = AsapState::new();
        asap.tick(Timestamp::from_millis(0), None, 0.0, false);
        let bytes = asap.tick(Timestamp::from_millis(100), Some(Timestamp::from_millis(0)), 1_000_000.0, false);
        assert_eq!(bytes, 0);
        assert!(asap.sleep_time_accumulated > Duration::ZERO);
    }
}
