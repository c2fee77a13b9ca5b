//! Packet-less pseudo-queue for zombie latency classes.
//!
//! Holds a byte count rather than packet handles; packets are only
//! materialised on dequeue, synthesized fresh from the pool. Unicast
//! destinations keep a single counter; multicast destinations keep one
//! counter per member bin, since a zombie's "population" differs by
//! destination once any class member has already been serviced.

use bpf_pool::{Packet, PacketPool, PoolError};
use bpf_types::{BinIndex, DstVec, LatencyClass, PacketMeta};

/// Per the component design's zombie synthesis cap: no single synthesized
/// zombie packet exceeds this many bytes, regardless of how much is owed.
pub const MAX_ZOMBIE_LEN_BYTES: u32 = 1500;

enum Counter {
    Unicast(u32),
    Multicast(Vec<u32>),
}

pub struct ZombieQueue {
    counter: Counter,
    class: LatencyClass,
}

impl ZombieQueue {
    pub fn unicast(class: LatencyClass) -> Self {
        debug_assert!(class.is_zombie_class());
        ZombieQueue { counter: Counter::Unicast(0), class }
    }

    pub fn multicast(class: LatencyClass) -> Self {
        debug_assert!(class.is_zombie_class());
        ZombieQueue {
            counter: Counter::Multicast(vec![0u32; BinIndex::MAX_BINS]),
            class,
        }
    }

    /// Total bytes owed across every tracked destination — used for queue
    /// depth accounting that doesn't distinguish multicast members.
    pub fn total_bytes(&self) -> u32 {
        match &self.counter {
            Counter::Unicast(n) => *n,
            Counter::Multicast(v) => v.iter().sum(),
        }
    }

    /// Bytes owed for the destinations named in `dst_vec` (unicast: the
    /// single counter, ignoring `dst_vec`'s contents).
    pub fn bytes_for(&self, dst_vec: DstVec) -> u32 {
        match &self.counter {
            Counter::Unicast(n) => *n,
            Counter::Multicast(v) => dst_vec.iter().map(|b| v[b.as_usize()]).sum(),
        }
    }

    /// Add synthetic bytes directly, without allocating a packet. For
    /// multicast, `n` bytes are credited to every bin set in `dst_vec`.
    pub fn add_bytes(&mut self, n: u32, dst_vec: DstVec) {
        if n == 0 {
            return;
        }
        match &mut self.counter {
            Counter::Unicast(c) => *c = c.saturating_add(n),
            Counter::Multicast(v) => {
                for bin in dst_vec.iter() {
                    v[bin.as_usize()] = v[bin.as_usize()].saturating_add(n);
                }
            }
        }
    }

    fn subtract(&mut self, n: u32, dst_vec: DstVec) -> u32 {
        match &mut self.counter {
            Counter::Unicast(c) => {
                let taken = n.min(*c);
                *c -= taken;
                taken
            }
            Counter::Multicast(v) => {
                let mut taken_total = 0u32;
                let members: Vec<BinIndex> = dst_vec.iter().collect();
                if members.is_empty() {
                    return 0;
                }
                // Spread evenly across members; remainder absorbed by the
                // first members so the sum taken matches exactly `n` when
                // enough is owed.
                let share = n / members.len() as u32;
                let mut remainder = n % members.len() as u32;
                for bin in members {
                    let mut want = share;
                    if remainder > 0 {
                        want += 1;
                        remainder -= 1;
                    }
                    let taken = want.min(v[bin.as_usize()]);
                    v[bin.as_usize()] -= taken;
                    taken_total += taken;
                }
                taken_total
            }
        }
    }

    /// Synthesizes a fresh packet of `min(remaining, max_bytes,
    /// MAX_ZOMBIE_LEN_BYTES)` and subtracts that amount from the counter.
    /// Returns `Ok(None)` if nothing is owed; a pool exhaustion is
    /// recoverable (the component design: "skip injection this round") and
    /// surfaces as `Err`.
    pub fn dequeue(
        &mut self,
        pool: &PacketPool,
        max_bytes: u32,
        dst_vec: DstVec,
    ) -> Result<Option<Packet>, PoolError> {
        let owed = self.bytes_for(dst_vec);
        if owed == 0 {
            return Ok(None);
        }
        let size = owed.min(max_bytes).min(MAX_ZOMBIE_LEN_BYTES);
        if size == 0 {
            return Ok(None);
        }
        let mut pkt = pool.get(bpf_types::TimestampMode::Now)?;
        pkt.meta = PacketMeta::new(self.class, dst_vec, pkt.meta.recv_time_ns);
        pkt.meta.virtual_length = size;
        self.subtract(size, dst_vec);
        Ok(Some(pkt))
    }

    /// Subtract `max_bytes` worth of owed bytes without synthesizing a
    /// packet — used when a dequeued zombie is discarded rather than sent.
    /// Clamps to zero; never goes negative.
    pub fn drop_bytes(&mut self, max_bytes: u32, dst_vec: DstVec) -> u32 {
        self.subtract(max_bytes, dst_vec)
    }

    pub fn class(&self) -> LatencyClass {
        self.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicast_add_and_dequeue() {
        let pool = PacketPool::new_standalone();
        let mut zq = ZombieQueue::unicast(LatencyClass::HighLatZlr);
        zq.add_bytes(3000, DstVec::single(BinIndex(1)));
        assert_eq!(zq.total_bytes(), 3000);
        let pkt = zq.dequeue(&pool, 1000, DstVec::single(BinIndex(1))).unwrap().unwrap();
        assert_eq!(pkt.meta.virtual_length, 1000);
        assert_eq!(zq.total_bytes(), 2000);
    }

    #[test]
    fn dequeue_caps_at_max_zombie_len() {
        let pool = PacketPool::new_standalone();
        let mut zq = ZombieQueue::unicast(LatencyClass::HighLatZlr);
        zq.add_bytes(10_000, DstVec::single(BinIndex(0)));
        let pkt = zq.dequeue(&pool, 100_000, DstVec::single(BinIndex(0))).unwrap().unwrap();
        assert_eq!(pkt.meta.virtual_length, MAX_ZOMBIE_LEN_BYTES);
    }

    #[test]
    fn counter_never_goes_negative() {
        let mut zq = ZombieQueue::unicast(LatencyClass::HighLatZlr);
        zq.add_bytes(10, DstVec::single(BinIndex(0)));
        let dropped = zq.drop_bytes(1000, DstVec::single(BinIndex(0)));
        assert_eq!(dropped, 10);
        assert_eq!(zq.total_bytes(), 0);
    }

    #[test]
    fn multicast_bytes_tracked_per_bin() {
        let mut zq = ZombieQueue::multicast(LatencyClass::HighLatZlr);
        let group = DstVec::single(BinIndex(1)).union(&DstVec::single(BinIndex(2)));
        zq.add_bytes(100, group);
        assert_eq!(zq.bytes_for(DstVec::single(BinIndex(1))), 100);
        assert_eq!(zq.bytes_for(DstVec::single(BinIndex(2))), 100);
        assert_eq!(zq.bytes_for(group), 200);
    }

    #[test]
    fn empty_queue_dequeue_is_none() {
        let pool = PacketPool::new_standalone();
        let mut zq = ZombieQueue::unicast(LatencyClass::HighLatZlr);
        assert!(zq.dequeue(&pool, 1000, DstVec::single(BinIndex(0))).unwrap().is_none());
    }
}
