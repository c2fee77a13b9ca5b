//! Per-destination holder of one queue per latency class.
//!
//! Enforces the drop policy, keeps the per-class byte matrix and the shared
//! [`QueueDepths`] table in lockstep, and hosts this destination's ZLR lanes
//! plus whichever anti-starvation engine (ASAP or NPLB) is configured.

use crate::drop_policy::DropPolicy;
use crate::error::QueueError;
use crate::packet_queue::{PacketQueue, QueueOrdering, DEFAULT_MAX_DEPTH_PKTS};
use crate::queue::Queue;
use crate::queue_depths::QueueDepths;
use crate::zombie_queue::ZombieQueue;
use bpf_algorithms::clock::Timestamp;
use bpf_algorithms::{AntiStarvationAlgorithm, AsapState, AsapTuning, NplbState, ZlrLane, ZlrTuning};
use bpf_pool::{Packet, PacketPool};
use bpf_types::{BinIndex, DstVec, LatencyClass};
use std::sync::Arc;
use tracing::{trace, warn};

/// What a completed `Dequeue` produced, for the caller to hand to the
/// transport and for `OnDequeue` accounting.
pub struct DequeueOutcome {
    pub packet: Packet,
    pub class: LatencyClass,
    pub bytes: u32,
    pub cloned: bool,
}

pub struct BinQueueMgr {
    dst_bin: BinIndex,
    multicast: bool,
    drop_policy: DropPolicy,
    max_bin_depth_pkts: usize,
    queues: Vec<Queue>,
    per_class_bytes: Vec<u32>,
    local_depths: Arc<QueueDepths>,
    pool: Arc<PacketPool>,
    last_dequeue_time: Option<Timestamp>,
    zlr: ZlrLane,
    zlr_ls: ZlrLane,
    algorithm: AntiStarvationAlgorithm,
    asap: Option<AsapState>,
    nplb: Option<NplbState>,
}

fn build_queues(multicast: bool, drop_policy: DropPolicy, max_bin_depth_pkts: usize) -> Vec<Queue> {
    LatencyClass::PRIORITY_ORDER
        .iter()
        .map(|class| {
            if class.is_zombie_class() {
                if multicast {
                    Queue::Zombie(ZombieQueue::multicast(*class))
                } else {
                    Queue::Zombie(ZombieQueue::unicast(*class))
                }
            } else {
                Queue::Packet(PacketQueue::new(QueueOrdering::Insertion, drop_policy, max_bin_depth_pkts))
            }
        })
        .collect()
}

impl BinQueueMgr {
    pub fn new(
        dst_bin: BinIndex,
        multicast: bool,
        drop_policy: DropPolicy,
        local_depths: Arc<QueueDepths>,
        pool: Arc<PacketPool>,
        algorithm: AntiStarvationAlgorithm,
        zlr_tuning: ZlrTuning,
        asap_tuning: AsapTuning,
    ) -> Self {
        let max_bin_depth_pkts = DEFAULT_MAX_DEPTH_PKTS;
        let (asap, nplb) = match algorithm {
            AntiStarvationAlgorithm::Base => (None, None),
            AntiStarvationAlgorithm::Asap => (Some(AsapState::with_tuning(asap_tuning)), None),
            AntiStarvationAlgorithm::Nplb => (None, Some(NplbState::new())),
        };
        BinQueueMgr {
            dst_bin,
            multicast,
            drop_policy,
            max_bin_depth_pkts,
            queues: build_queues(multicast, drop_policy, max_bin_depth_pkts),
            per_class_bytes: vec![0u32; LatencyClass::COUNT],
            local_depths,
            pool,
            last_dequeue_time: None,
            zlr: ZlrLane::with_tuning(zlr_tuning),
            zlr_ls: ZlrLane::with_tuning(zlr_tuning),
            algorithm,
            asap,
            nplb,
        }
    }

    pub fn dst_bin(&self) -> BinIndex {
        self.dst_bin
    }

    fn class_queue_mut(&mut self, class: LatencyClass) -> &mut Queue {
        &mut self.queues[class.index()]
    }

    fn nonzombie_depth(&self, ls_only: bool) -> u32 {
        LatencyClass::PRIORITY_ORDER
            .iter()
            .filter(|c| !c.is_zombie_class() && (!ls_only || c.is_latency_sensitive()))
            .map(|c| self.per_class_bytes[c.index()])
            .sum()
    }

    fn current_zombie_bytes(&self, ls: bool) -> u32 {
        LatencyClass::PRIORITY_ORDER
            .iter()
            .filter(|c| if ls { c.is_zlr_ls_zombie_class() } else { c.is_zlr_zombie_class() })
            .map(|c| self.per_class_bytes[c.index()])
            .sum()
    }

    /// Admit a packet. On success, ownership has transferred into this
    /// manager; on drop-policy eviction the evicted packet is returned for
    /// the caller to recycle. `NO_DROP` rejection and out-of-range `dst_vec`
    /// bits return the packet to the caller via the error.
    pub fn enqueue(&mut self, now: Timestamp, mut pkt: Packet) -> Result<Option<Packet>, (Packet, QueueError)> {
        let class = pkt.meta.latency_class;
        let dst_vec = if self.multicast { pkt.meta.dst_vec } else { DstVec::single(self.dst_bin) };
        let length = pkt.meta.virtual_length.max(pkt.data.len() as u32);
        pkt.meta.virtual_length = length;

        let was_empty = self.per_class_bytes.iter().sum::<u32>() == 0;

        let evicted = if class.is_zombie_class() {
            let zq = self.class_queue_mut(class).as_zombie_queue_mut().expect("zombie class backed by ZombieQueue");
            zq.add_bytes(length, dst_vec);
            self.pool.recycle(pkt);
            None
        } else {
            let pq = self.class_queue_mut(class).as_packet_queue_mut().expect("packet class backed by PacketQueue");
            match pq.enqueue(pkt) {
                Ok(evicted) => evicted,
                Err((returned, _)) => return Err((returned, QueueError::FullNoDrop)),
            }
        };

        let evicted_len = evicted.as_ref().map(|p| p.meta.virtual_length).unwrap_or(0);
        let net_delta = length as i64 - evicted_len as i64;
        self.per_class_bytes[class.index()] = (self.per_class_bytes[class.index()] as i64 + net_delta).max(0) as u32;

        let ls_delta = if class.is_latency_sensitive() { net_delta } else { 0 };
        self.local_depths
            .adjust(self.dst_bin, net_delta, ls_delta)
            .map_err(|e| {
                let dummy = self.pool.get(bpf_types::TimestampMode::None).expect("instrumentation alloc");
                (dummy, QueueError::Depths(e))
            })?;

        if !class.is_zombie_class() {
            self.zlr.on_enqueue(now, self.nonzombie_depth(false));
            if class.is_latency_sensitive() {
                self.zlr_ls.on_enqueue(now, self.nonzombie_depth(true));
            }
        }

        if was_empty {
            self.last_dequeue_time.get_or_insert(now);
        }

        if let Some(evicted) = evicted {
            self.pool.recycle(evicted);
        }

        trace!(dst = %self.dst_bin, ?class, length, "enqueued");
        Ok(None)
    }

    /// Dequeue the given class, obeying `max_bytes`. For multicast
    /// destinations with `dst_vec` a strict subset of the head packet's
    /// remaining destinations, clones the packet for the selected subset
    /// and leaves the (reduced) original in the queue.
    pub fn dequeue(
        &mut self,
        now: Timestamp,
        class: LatencyClass,
        max_bytes: u32,
        dst_vec: DstVec,
    ) -> Result<Option<DequeueOutcome>, QueueError> {
        let is_zombie = class.is_zombie_class();

        if !is_zombie && self.multicast {
            if let Some(pq) = self.class_queue_mut(class).as_packet_queue_mut() {
                if let Some(head) = pq.peek() {
                    if dst_vec.is_subset_of(&head.meta.dst_vec) && dst_vec != head.meta.dst_vec {
                        let head_len = head.meta.virtual_length;
                        if head_len > max_bytes {
                            return Ok(None);
                        }
                        let cloned = self.pool.clone_packet(head, false, bpf_types::TimestampMode::Copy)?;
                        let mut cloned = cloned;
                        cloned.meta.dst_vec = dst_vec;
                        // shrink the remaining original's destination set
                        let pq = self.class_queue_mut(class).as_packet_queue_mut().unwrap();
                        // SAFETY: peek_mut-equivalent via dequeue+requeue,
                        // since PacketQueue exposes no direct mutable peek.
                        let mut original = pq.dequeue(u32::MAX).expect("head present");
                        original.meta.dst_vec = original.meta.dst_vec.difference(&dst_vec);
                        pq.requeue_at_head(original);

                        self.on_dequeue(now, class, head_len, true, dst_vec)?;
                        return Ok(Some(DequeueOutcome { packet: cloned, class, bytes: head_len, cloned: true }));
                    }
                }
            }
        }

        let queue = self.class_queue_mut(class);
        let bytes_before = queue.available_bytes(dst_vec);
        let dequeued = queue.dequeue(&self.pool, max_bytes, dst_vec)?;
        let Some(packet) = dequeued else {
            return Ok(None);
        };
        let bytes = if is_zombie { packet.meta.virtual_length } else { packet.meta.virtual_length.min(bytes_before.max(packet.meta.virtual_length)) };
        self.on_dequeue(now, class, bytes, false, dst_vec)?;
        Ok(Some(DequeueOutcome { packet, class, bytes, cloned: false }))
    }

    /// Shared accounting for both the plain and multicast-subset dequeue
    /// paths: updates byte matrices, `queue_depths_`, ZLR, and ASAP/NPLB.
    fn on_dequeue(&mut self, now: Timestamp, class: LatencyClass, bytes: u32, _cloned: bool, dst_vec: DstVec) -> Result<(), QueueError> {
        self.per_class_bytes[class.index()] = self.per_class_bytes[class.index()].saturating_sub(bytes);
        let ls_delta = if class.is_latency_sensitive() { -(bytes as i64) } else { 0 };
        self.local_depths.adjust(self.dst_bin, -(bytes as i64), ls_delta)?;
        self.last_dequeue_time = Some(now);

        if class.is_zombie_class() {
            if class.is_zlr_zombie_class() {
                self.zlr.on_zombie_dequeue(now);
            }
            if class.is_zlr_ls_zombie_class() {
                self.zlr_ls.on_zombie_dequeue(now);
            }
        } else {
            let rate = 0i64; // instantaneous rate is a scheduler-level concern; see QueueStore::periodic_adjust.
            let inject = self.zlr.on_nonzombie_dequeue(now, bytes, self.nonzombie_depth(false), self.current_zombie_bytes(false), rate);
            if inject > 0 {
                self.inject_zombie(LatencyClass::HighLatZlr, inject, dst_vec);
            }
            if class.is_latency_sensitive() {
                let inject_ls = self.zlr_ls.on_nonzombie_dequeue(now, bytes, self.nonzombie_depth(true), self.current_zombie_bytes(true), rate);
                if inject_ls > 0 {
                    self.inject_zombie(LatencyClass::HighLatZlrLs, inject_ls, dst_vec);
                }
            }
            if let Some(asap) = &mut self.asap {
                asap.on_dequeue(now);
            }
        }
        Ok(())
    }

    /// Inject `bytes` of synthetic load into `class` directly (bypassing the
    /// public `enqueue`, since zombie injection never goes through the
    /// packet pool on the way in).
    fn inject_zombie(&mut self, class: LatencyClass, bytes: u32, dst_vec: DstVec) {
        if let Some(zq) = self.class_queue_mut(class).as_zombie_queue_mut() {
            zq.add_bytes(bytes, dst_vec);
            self.per_class_bytes[class.index()] = self.per_class_bytes[class.index()].saturating_add(bytes);
            let ls_delta = if class.is_latency_sensitive() { bytes as i64 } else { 0 };
            if let Err(e) = self.local_depths.adjust(self.dst_bin, bytes as i64, ls_delta) {
                warn!(error = %e, "ZLR injection violated queue-depths invariant");
            }
        }
    }

    /// First nonempty class in priority order with bytes available for
    /// `dst_vec`, and how many bytes it can offer right now.
    pub fn next_dequeue_size(&self, dst_vec: DstVec) -> Option<(LatencyClass, u32)> {
        LatencyClass::PRIORITY_ORDER.iter().find_map(|class| {
            let bytes = self.queues[class.index()].available_bytes(dst_vec);
            if bytes > 0 {
                Some((*class, bytes))
            } else {
                None
            }
        })
    }

    /// The depth this destination should advertise over QLAM / use for
    /// gradient computation, per the configured algorithm.
    pub fn advertised_depth(&self) -> Result<(u32, u32), QueueError> {
        let raw = self.local_depths.get(self.dst_bin)?;
        match (&self.algorithm, &self.nplb) {
            (AntiStarvationAlgorithm::Nplb, Some(nplb)) => {
                let bias = nplb.delay_term_bytes();
                Ok((raw.total_bytes.saturating_add(bias), raw.ls_bytes.saturating_add(bias)))
            }
            _ => Ok((raw.total_bytes, raw.ls_bytes)),
        }
    }

    /// Runs the anti-starvation tick (ASAP) and the ZLR window's idle
    /// contraction, per the base class's fixed 5ms cadence (the scheduler
    /// decides when 5ms has elapsed; this just performs the work for one
    /// call).
    pub fn periodic_adjust(&mut self, now: Timestamp, capacity_share_bps: f64) -> Result<(), QueueError> {
        self.zlr.tick_contract(now);
        self.zlr_ls.tick_contract(now);

        if let Some(asap) = &mut self.asap {
            let hol = self.next_dequeue_size(DstVec::single(self.dst_bin));
            let hol_recv = hol.and_then(|(class, _)| {
                self.queues[class.index()]
                    .as_packet_queue()
                    .and_then(|q| q.peek())
                    .map(|p| Timestamp::from_nanos(p.meta.recv_time_ns))
            });
            let is_ls = hol.map(|(c, _)| c.is_latency_sensitive()).unwrap_or(false);
            let inject = asap.tick(now, hol_recv, capacity_share_bps, is_ls);
            if inject > 0 {
                self.inject_zombie(LatencyClass::HighLatExp, inject, DstVec::single(self.dst_bin));
            }
        }
        Ok(())
    }

    pub fn update_gradient_cap(&mut self, this_gradient: i64, current_max_gradient: i64, hysteresis: u32) {
        if let Some(asap) = &mut self.asap {
            asap.update_gradient_cap(this_gradient, current_max_gradient, hysteresis, false);
            asap.update_gradient_cap(this_gradient, current_max_gradient, hysteresis, true);
        }
    }

    pub fn update_capacity(&mut self, pc_num: u32, bps: u64) {
        if let Some(asap) = &mut self.asap {
            asap.update_capacity(pc_num, bps);
        }
        if let Some(nplb) = &mut self.nplb {
            nplb.update_drain_rate(bps as f64);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_class_bytes.iter().all(|b| *b == 0)
    }

    /// Drain every queue without transmitting, recycling packets as we go.
    pub fn purge(&mut self) {
        for queue in &mut self.queues {
            if let Some(pq) = queue.as_packet_queue_mut() {
                for pkt in pq.purge() {
                    self.pool.recycle(pkt);
                }
            }
        }
        for b in &mut self.per_class_bytes {
            *b = 0;
        }
        let _ = self.local_depths.set(self.dst_bin, 0, 0).or_else(|_| {
            self.local_depths.adjust(self.dst_bin, -(i64::MAX / 2), -(i64::MAX / 2))
        });
    }

    /// Undo a just-completed dequeue after the transport refused the
    /// packet (§7's transient-backpressure path): restores byte accounting
    /// and, for a plain non-multicast-split dequeue, re-admits the packet
    /// at the head of its class queue so FIFO order is preserved. A cloned
    /// multicast-subset packet has no single head slot to return to — it
    /// is simply re-accounted as still-pending and recycled, which is a
    /// pragmatic approximation: the reduced original packet is already
    /// back in queue, only the cloned subset's bytes need restoring.
    pub fn requeue_head(&mut self, now: Timestamp, outcome: DequeueOutcome) {
        let DequeueOutcome { packet, class, bytes, cloned } = outcome;

        self.per_class_bytes[class.index()] = self.per_class_bytes[class.index()].saturating_add(bytes);
        let ls_delta = if class.is_latency_sensitive() { bytes as i64 } else { 0 };
        if let Err(e) = self.local_depths.adjust(self.dst_bin, bytes as i64, ls_delta) {
            warn!(dst = %self.dst_bin, error = %e, "requeue depth restore failed");
        }
        self.last_dequeue_time = Some(now);

        if cloned || class.is_zombie_class() {
            self.pool.recycle(packet);
            return;
        }

        if let Some(pq) = self.class_queue_mut(class).as_packet_queue_mut() {
            pq.requeue_at_head(packet);
        } else {
            self.pool.recycle(packet);
        }
    }

    /// Invariant 1 from the testable-properties list: per-destination total
    /// equals the sum of this destination's per-class bytes.
    pub fn check_invariants(&self) -> Result<(), QueueError> {
        let sum: u32 = self.per_class_bytes.iter().sum();
        let recorded = self.local_depths.get(self.dst_bin)?;
        if recorded.total_bytes != sum {
            return Err(QueueError::InvariantViolation(format!(
                "bin {}: queue_depths total {} != per-class sum {}",
                self.dst_bin.0, recorded.total_bytes, sum
            )));
        }
        if recorded.ls_bytes > recorded.total_bytes {
            return Err(QueueError::InvariantViolation(format!(
                "bin {}: ls_bytes {} > total_bytes {}",
                self.dst_bin.0, recorded.ls_bytes, recorded.total_bytes
            )));
        }
        Ok(())
    }
}

trait TimestampExt {
    fn from_nanos(ns: u64) -> Self;
}

impl TimestampExt for Timestamp {
    fn from_nanos(ns: u64) -> Self {
        std::time::Duration::from_nanos(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpf_types::TimestampMode;

    fn mk_mgr(drop_policy: DropPolicy) -> BinQueueMgr {
        let depths = Arc::new(QueueDepths::local());
        let pool = Arc::new(PacketPool::new_standalone());
        BinQueueMgr::new(BinIndex(7), false, drop_policy, depths, pool, AntiStarvationAlgorithm::Base, ZlrTuning::default(), AsapTuning::default())
    }

    fn mk_packet(mgr: &BinQueueMgr, class: LatencyClass, len: u32) -> Packet {
        let mut p = mgr.pool.get(TimestampMode::None).unwrap();
        p.meta.latency_class = class;
        p.meta.virtual_length = len;
        p.data = vec![0u8; len as usize];
        p
    }

    #[test]
    fn s1_fifo_preservation() {
        let mut mgr = mk_mgr(DropPolicy::Head);
        let t = Timestamp::from_millis(0);
        let p1 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let p2 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let p3 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let (i1, i2, i3) = (p1.index(), p2.index(), p3.index());

        mgr.enqueue(t, p1).unwrap();
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 1000);
        mgr.enqueue(t, p2).unwrap();
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 2000);
        mgr.enqueue(t, p3).unwrap();
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 3000);

        let d1 = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(d1.packet.index(), i1);
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 2000);
        let d2 = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(d2.packet.index(), i2);
        let d3 = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(d3.packet.index(), i3);
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 0);
    }

    #[test]
    fn s2_head_drop_on_overflow() {
        let depths = Arc::new(QueueDepths::local());
        let pool = Arc::new(PacketPool::new_standalone());
        let mut mgr = BinQueueMgr::new(BinIndex(7), false, DropPolicy::Head, depths, pool, AntiStarvationAlgorithm::Base, ZlrTuning::default(), AsapTuning::default());
        mgr.max_bin_depth_pkts = 2;
        mgr.queues = build_queues(false, DropPolicy::Head, 2);

        let t = Timestamp::from_millis(0);
        let p1 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let p2 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let p3 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let (i2, i3) = (p2.index(), p3.index());

        mgr.enqueue(t, p1).unwrap();
        mgr.enqueue(t, p2).unwrap();
        mgr.enqueue(t, p3).unwrap();

        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 2000);
        let d1 = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(d1.packet.index(), i2);
        let d2 = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(d2.packet.index(), i3);
    }

    #[test]
    fn no_drop_enqueue_failure_returns_packet() {
        let depths = Arc::new(QueueDepths::local());
        let pool = Arc::new(PacketPool::new_standalone());
        let mut mgr = BinQueueMgr::new(BinIndex(1), false, DropPolicy::NoDrop, depths, pool, AntiStarvationAlgorithm::Base, ZlrTuning::default(), AsapTuning::default());
        mgr.max_bin_depth_pkts = 1;
        mgr.queues = build_queues(false, DropPolicy::NoDrop, 1);
        let t = Timestamp::from_millis(0);
        let p1 = mk_packet(&mgr, LatencyClass::NormalLatency, 100);
        mgr.enqueue(t, p1).unwrap();
        let p2 = mk_packet(&mgr, LatencyClass::NormalLatency, 100);
        let (returned, err) = mgr.enqueue(t, p2).unwrap_err();
        assert_eq!(err, QueueError::FullNoDrop);
        assert_eq!(returned.len(), 100);
    }

    #[test]
    fn zombie_enqueue_recycles_packet_and_updates_depths() {
        let mut mgr = mk_mgr(DropPolicy::Head);
        let t = Timestamp::from_millis(0);
        let pkt = mk_packet(&mgr, LatencyClass::HighLatZlr, 500);
        mgr.enqueue(t, pkt).unwrap();
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 500);
        let d = mgr.dequeue(t, LatencyClass::HighLatZlr, 1000, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(d.bytes, 500);
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 0);
    }

    #[test]
    fn invariants_hold_after_mixed_traffic() {
        let mut mgr = mk_mgr(DropPolicy::Head);
        let t = Timestamp::from_millis(0);
        for _ in 0..5 {
            let pkt = mk_packet(&mgr, LatencyClass::Critical, 200);
            mgr.enqueue(t, pkt).unwrap();
        }
        let zpkt = mk_packet(&mgr, LatencyClass::HighLatRcvd, 300);
        mgr.enqueue(t, zpkt).unwrap();
        mgr.check_invariants().unwrap();
        mgr.dequeue(t, LatencyClass::Critical, 200, DstVec::single(BinIndex(7))).unwrap();
        mgr.check_invariants().unwrap();
    }

    #[test]
    fn s6_requeue_after_transport_refusal_preserves_order() {
        let mut mgr = mk_mgr(DropPolicy::Head);
        let t = Timestamp::from_millis(0);
        let p1 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let p2 = mk_packet(&mgr, LatencyClass::NormalLatency, 1000);
        let (i1, i2) = (p1.index(), p2.index());
        mgr.enqueue(t, p1).unwrap();
        mgr.enqueue(t, p2).unwrap();

        let outcome = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(outcome.packet.index(), i1);
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 1000);

        mgr.requeue_head(t, outcome);
        assert_eq!(mgr.local_depths.get(BinIndex(7)).unwrap().total_bytes, 2000);
        mgr.check_invariants().unwrap();

        let redo = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(redo.packet.index(), i1);
        let next = mgr.dequeue(t, LatencyClass::NormalLatency, 1500, DstVec::single(BinIndex(7))).unwrap().unwrap();
        assert_eq!(next.packet.index(), i2);
    }
}
