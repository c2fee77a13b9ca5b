//! Zombie Latency Reduction.
//!
//! Pads a destination's queue with synthetic bytes representing the portion
//! that is always occupied (the "floor"), so admitted real packets see
//! fewer real bytes ahead of them without changing the destination's total
//! backpressure weight. Two independent lanes run per destination — one
//! over non-zombie bytes, one over latency-sensitive non-zombie bytes —
//! each with its own observation window and fast-recovery state machine.

use crate::clock::Timestamp;
use std::collections::VecDeque;
use std::time::Duration;

pub const HWM_BYTES: u32 = 6000;
pub const LWM_BYTES: u32 = 2000;
pub const WINDOW_MIN: Duration = Duration::from_millis(200);
pub const WINDOW_MAX: Duration = Duration::from_millis(5000);
pub const WINDOW_INITIAL: Duration = Duration::from_millis(1000);
/// Minimum time between successive window-size changes, so a single burst
/// of zombie dequeues can't ratchet the window up repeatedly in one tick.
const WINDOW_CHANGE_COOLDOWN: Duration = Duration::from_millis(250);
/// Multiplicative step applied when expanding/contracting the window.
const WINDOW_STEP: f64 = 1.1;
/// How long without a zombie dequeue before the window starts contracting.
const CONTRACT_IDLE: Duration = Duration::from_millis(500);

const DIP_BYTES_THRESHOLD: u32 = 40_000;
const DIP_DETECT_WINDOW: Duration = Duration::from_millis(500);
const RECOVERY_DEPTH_THRESHOLD: u32 = 10_000;
const OSCILLATORY_RESET: Duration = Duration::from_secs(3);
/// Minimum queue-depth change rate (bytes/sec) that still counts as "not
/// draining faster than this" for the HWM injection gate.
const MIN_CHANGE_RATE_BPS: i64 = -2000;

/// The watermark, window-bound, and fast-recovery tunables a `ZlrLane` is
/// built from. `lwm_bytes` is carried for configuration-surface parity with
/// the component design's watermark pair but, per the dequeue algorithm as
/// specified, only `hwm_bytes` gates injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZlrTuning {
    pub hwm_bytes: u32,
    pub lwm_bytes: u32,
    pub window_min: Duration,
    pub window_max: Duration,
    pub window_initial: Duration,
    pub fast_recovery_enabled: bool,
}

impl Default for ZlrTuning {
    fn default() -> Self {
        ZlrTuning {
            hwm_bytes: HWM_BYTES,
            lwm_bytes: LWM_BYTES,
            window_min: WINDOW_MIN,
            window_max: WINDOW_MAX,
            window_initial: WINDOW_INITIAL,
            fast_recovery_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastRecoveryState {
    Steady,
    Dip,
    Recovering,
    Recovered,
    Oscillatory,
}

/// Tracks the minimum non-zombie depth observed over a dynamic window `W`.
struct QueueDepthDynamics {
    window: Duration,
    window_min: Duration,
    window_max: Duration,
    samples: VecDeque<(Timestamp, u32)>,
    last_window_change: Timestamp,
    last_zombie_dq: Option<Timestamp>,
}

impl QueueDepthDynamics {
    fn new(tuning: &ZlrTuning) -> Self {
        QueueDepthDynamics {
            window: tuning.window_initial,
            window_min: tuning.window_min,
            window_max: tuning.window_max,
            samples: VecDeque::new(),
            last_window_change: Timestamp::ZERO,
            last_zombie_dq: None,
        }
    }

    fn record(&mut self, now: Timestamp, depth: u32) {
        self.samples.push_back((now, depth));
        self.evict_stale(now);
    }

    fn evict_stale(&mut self, now: Timestamp) {
        while let Some((t, _)) = self.samples.front() {
            if now.saturating_sub(*t) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn min_depth(&self) -> u32 {
        self.samples.iter().map(|(_, d)| *d).min().unwrap_or(0)
    }

    fn expand(&mut self, now: Timestamp) {
        if now.saturating_sub(self.last_window_change) < WINDOW_CHANGE_COOLDOWN {
            return;
        }
        let new = Duration::from_secs_f64((self.window.as_secs_f64() * WINDOW_STEP).min(self.window_max.as_secs_f64()));
        if new != self.window {
            self.window = new;
            self.last_window_change = now;
        }
    }

    fn contract(&mut self, now: Timestamp) {
        if now.saturating_sub(self.last_window_change) < WINDOW_CHANGE_COOLDOWN {
            return;
        }
        let new = Duration::from_secs_f64((self.window.as_secs_f64() / WINDOW_STEP).max(self.window_min.as_secs_f64()));
        if new != self.window {
            self.window = new;
            self.last_window_change = now;
        }
    }
}

struct FastRecovery {
    state: FastRecoveryState,
    enabled: bool,
    dip_events: VecDeque<(Timestamp, u32)>,
    pre_dip_zombie_bytes: u32,
    injected_since_recovering: u32,
    recovered_at: Option<Timestamp>,
}

impl FastRecovery {
    fn new(enabled: bool) -> Self {
        FastRecovery {
            state: FastRecoveryState::Steady,
            enabled,
            dip_events: VecDeque::new(),
            pre_dip_zombie_bytes: 0,
            injected_since_recovering: 0,
            recovered_at: None,
        }
    }

    /// No-op when the sub-state-machine is configured off: `state` then
    /// never leaves STEADY, so every dequeue falls through to the plain
    /// HWM/rate check in `ZlrLane::on_nonzombie_dequeue`.
    fn note_dequeue(&mut self, now: Timestamp, size: u32, current_zombie_bytes: u32) {
        if !self.enabled {
            return;
        }
        self.dip_events.push_back((now, size));
        while let Some((t, _)) = self.dip_events.front() {
            if now.saturating_sub(*t) > DIP_DETECT_WINDOW {
                self.dip_events.pop_front();
            } else {
                break;
            }
        }
        let sum: u32 = self.dip_events.iter().map(|(_, s)| *s).sum();

        match self.state {
            FastRecoveryState::Steady => {
                if sum >= DIP_BYTES_THRESHOLD {
                    self.state = FastRecoveryState::Dip;
                    self.pre_dip_zombie_bytes = current_zombie_bytes;
                }
            }
            FastRecoveryState::Recovered => {
                if sum >= DIP_BYTES_THRESHOLD {
                    self.state = FastRecoveryState::Oscillatory;
                    self.recovered_at = Some(now);
                } else if let Some(since) = self.recovered_at {
                    if now.saturating_sub(since) > OSCILLATORY_RESET {
                        self.state = FastRecoveryState::Steady;
                    }
                }
            }
            FastRecoveryState::Oscillatory => {
                if let Some(since) = self.recovered_at {
                    if now.saturating_sub(since) > OSCILLATORY_RESET {
                        self.state = FastRecoveryState::Steady;
                        self.recovered_at = None;
                    }
                }
            }
            FastRecoveryState::Dip | FastRecoveryState::Recovering => {}
        }
    }

    fn maybe_enter_recovering(&mut self, current_nonzombie_depth: u32) {
        if !self.enabled {
            return;
        }
        if self.state == FastRecoveryState::Dip && current_nonzombie_depth >= RECOVERY_DEPTH_THRESHOLD {
            self.state = FastRecoveryState::Recovering;
            self.injected_since_recovering = 0;
        }
    }

    fn recovering_inject(&mut self, size: u32, now: Timestamp) -> u32 {
        let remaining_budget = self.pre_dip_zombie_bytes.saturating_sub(self.injected_since_recovering);
        let inject = size.min(remaining_budget);
        self.injected_since_recovering += inject;
        if self.injected_since_recovering >= self.pre_dip_zombie_bytes {
            self.state = FastRecoveryState::Recovered;
            self.recovered_at = Some(now);
        }
        inject
    }
}

pub struct ZlrLane {
    hwm_bytes: u32,
    dynamics: QueueDepthDynamics,
    fast_recovery: FastRecovery,
}

impl ZlrLane {
    pub fn new() -> Self {
        Self::with_tuning(ZlrTuning::default())
    }

    pub fn with_tuning(tuning: ZlrTuning) -> Self {
        ZlrLane {
            hwm_bytes: tuning.hwm_bytes,
            dynamics: QueueDepthDynamics::new(&tuning),
            fast_recovery: FastRecovery::new(tuning.fast_recovery_enabled),
        }
    }

    pub fn state(&self) -> FastRecoveryState {
        self.fast_recovery.state
    }

    pub fn window(&self) -> Duration {
        self.dynamics.window
    }

    pub fn on_enqueue(&mut self, now: Timestamp, current_nonzombie_depth: u32) {
        self.dynamics.record(now, current_nonzombie_depth);
    }

    /// Call after a non-zombie dequeue of `size` bytes. Returns the number
    /// of zombie bytes (0 or more) to enqueue into this lane's zombie class.
    pub fn on_nonzombie_dequeue(
        &mut self,
        now: Timestamp,
        size: u32,
        current_nonzombie_depth: u32,
        current_zombie_bytes: u32,
        change_rate_bps: i64,
    ) -> u32 {
        self.dynamics.record(now, current_nonzombie_depth);
        self.fast_recovery.note_dequeue(now, size, current_zombie_bytes);
        self.fast_recovery.maybe_enter_recovering(current_nonzombie_depth);

        if self.fast_recovery.state == FastRecoveryState::Recovering {
            return self.fast_recovery.recovering_inject(size, now);
        }

        if self.fast_recovery.state == FastRecoveryState::Oscillatory {
            return 0;
        }

        let m = self.dynamics.min_depth();
        if m >= self.hwm_bytes && change_rate_bps >= MIN_CHANGE_RATE_BPS {
            size
        } else {
            0
        }
    }

    /// Call after a zombie dequeue from this lane's class.
    pub fn on_zombie_dequeue(&mut self, now: Timestamp) {
        self.dynamics.last_zombie_dq = Some(now);
        if matches!(self.fast_recovery.state, FastRecoveryState::Steady | FastRecoveryState::Oscillatory) {
            self.dynamics.expand(now);
        }
    }

    /// Call periodically (e.g. from the 5ms adjustment tick) to let the
    /// window contract when there's been no recent zombie activity.
    pub fn tick_contract(&mut self, now: Timestamp) {
        let idle = match self.dynamics.last_zombie_dq {
            Some(t) => now.saturating_sub(t) >= CONTRACT_IDLE,
            None => true,
        };
        if idle {
            self.dynamics.contract(now);
        }
    }
}

impl Default for ZlrLane {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_injection_below_hwm() {
        let mut lane = ZlrLane::new();
        let t = Timestamp::from_millis(0);
        lane.on_enqueue(t, 1000);
        let bytes = lane.on_nonzombie_dequeue(t, 500, 1000, 0, 0);
        assert_eq!(bytes, 0);
    }

    #[test]
    fn injects_once_floor_established_above_hwm() {
        let mut lane = ZlrLane::new();
        let mut t = Timestamp::from_millis(0);
        // Keep depth pinned above HWM across the whole window so the
        // windowed minimum itself clears HWM.
        for _ in 0..20 {
            lane.on_enqueue(t, 8000);
            t += Duration::from_millis(60);
        }
        let bytes = lane.on_nonzombie_dequeue(t, 1000, 8000, 0, 0);
        assert_eq!(bytes, 1000);
    }

    fn lane_with_fast_recovery() -> ZlrLane {
        ZlrLane::with_tuning(ZlrTuning { fast_recovery_enabled: true, ..ZlrTuning::default() })
    }

    #[test]
    fn oscillatory_suppresses_injection() {
        let mut lane = lane_with_fast_recovery();
        lane.fast_recovery.state = FastRecoveryState::Oscillatory;
        let bytes = lane.on_nonzombie_dequeue(Timestamp::from_millis(0), 1000, 8000, 0, 0);
        assert_eq!(bytes, 0);
    }

    #[test]
    fn dip_then_recovering_bypasses_hwm_check() {
        let mut lane = lane_with_fast_recovery();
        let t0 = Timestamp::from_millis(0);
        // Sudden big dequeue triggers DIP.
        let bytes = lane.on_nonzombie_dequeue(t0, 40_000, 500, 2000, -5000);
        assert_eq!(bytes, 0); // below HWM, not yet in RECOVERY
        assert_eq!(lane.state(), FastRecoveryState::Dip);

        // Depth recovers above RECOVERY_DEPTH_THRESHOLD -> RECOVERING, and a
        // subsequent dequeue is injected regardless of HWM/rate.
        let t1 = t0 + Duration::from_millis(50);
        let bytes2 = lane.on_nonzombie_dequeue(t1, 500, 10_500, 0, -5000);
        assert_eq!(lane.state(), FastRecoveryState::Recovering);
        assert_eq!(bytes2, 500);
    }

    #[test]
    fn window_stays_within_bounds() {
        let mut lane = ZlrLane::new();
        let mut t = Timestamp::from_millis(0);
        for _ in 0..100 {
            t += Duration::from_millis(300);
            lane.on_zombie_dequeue(t);
        }
        assert!(lane.window() <= WINDOW_MAX);
        assert!(lane.window() >= WINDOW_MIN);
    }
}
