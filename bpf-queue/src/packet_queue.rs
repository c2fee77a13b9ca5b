//! FIFO of packet handles, insertion-ordered or time-keyed.

use crate::drop_policy::DropPolicy;
use bpf_pool::Packet;
use std::collections::VecDeque;
use thiserror::Error;

/// Default packet-count ceiling per the component design ("Size limits
/// default to 500 packets; the BinQueueMgr may override").
pub const DEFAULT_MAX_DEPTH_PKTS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrdering {
    /// Dequeue order equals enqueue order.
    Insertion,
    /// Dequeue order follows each packet's recv time, oldest first. Used
    /// only where packets can arrive out of receive-time order (e.g. after
    /// a retransmit adapter outside the core); plain ingress traffic is
    /// already time-ordered by arrival and behaves identically to
    /// `Insertion`.
    TimeKeyed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketQueueError {
    #[error("queue full under NO_DROP policy")]
    FullNoDrop,
}

/// A FIFO of packet handles backing one (destination, latency class) pair
/// that is not a packet-less zombie class.
pub struct PacketQueue {
    items: VecDeque<Packet>,
    ordering: QueueOrdering,
    drop_policy: DropPolicy,
    max_depth_pkts: usize,
}

impl PacketQueue {
    pub fn new(ordering: QueueOrdering, drop_policy: DropPolicy, max_depth_pkts: usize) -> Self {
        PacketQueue {
            items: VecDeque::new(),
            ordering,
            drop_policy,
            max_depth_pkts,
        }
    }

    pub fn with_defaults(drop_policy: DropPolicy) -> Self {
        Self::new(QueueOrdering::Insertion, drop_policy, DEFAULT_MAX_DEPTH_PKTS)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_depth_pkts
    }

    fn insertion_point(&self, pkt: &Packet) -> usize {
        match self.ordering {
            QueueOrdering::Insertion => self.items.len(),
            QueueOrdering::TimeKeyed => {
                // Find the first element whose recv time is >= pkt's, insert
                // before it; ties resolve to append-after (stable).
                self.items
                    .iter()
                    .position(|existing| existing.meta.recv_time_ns > pkt.meta.recv_time_ns)
                    .unwrap_or(self.items.len())
            }
        }
    }

    /// Enqueue `pkt`. If the queue is full: `Head` evicts the oldest packet
    /// first (returned to the caller for recycling); `Tail` and `NoDrop`
    /// both reject the new packet, returning it to the caller — `NoDrop`
    /// always, `Tail` only because rejecting the newest IS the policy.
    pub fn enqueue(&mut self, pkt: Packet) -> Result<Option<Packet>, (Packet, PacketQueueError)> {
        if self.is_full() {
            match self.drop_policy {
                DropPolicy::Head => {
                    let evicted = self.items.pop_front();
                    let at = self.insertion_point(&pkt);
                    self.items.insert(at, pkt);
                    return Ok(evicted);
                }
                DropPolicy::Tail => {
                    return Ok(Some(pkt));
                }
                DropPolicy::NoDrop => {
                    return Err((pkt, PacketQueueError::FullNoDrop));
                }
            }
        }
        let at = self.insertion_point(&pkt);
        self.items.insert(at, pkt);
        Ok(None)
    }

    /// Re-admit a packet at the front of the queue, as the scheduler does on
    /// transport refusal. Bypasses drop policy and max-depth: the packet
    /// was already counted as occupying this queue a moment ago.
    pub fn requeue_at_head(&mut self, pkt: Packet) {
        self.items.push_front(pkt);
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.items.front()
    }

    /// Byte length of the head-of-line packet, for the caller's max_bytes
    /// comparison before committing to a dequeue.
    pub fn peek_virtual_length(&self) -> Option<u32> {
        self.items.front().map(|p| p.meta.virtual_length)
    }

    /// Dequeues the head packet if it fits within `max_bytes`; FIFO order is
    /// preserved by never reaching past the head to find a smaller packet.
    pub fn dequeue(&mut self, max_bytes: u32) -> Option<Packet> {
        match self.peek_virtual_length() {
            Some(len) if len <= max_bytes => self.items.pop_front(),
            _ => None,
        }
    }

    /// Drop (without transporting) the head packet, honoring the same
    /// max_bytes gate as `dequeue`; used by the manual drop-policy path and
    /// by tests exercising eviction directly.
    pub fn drop_front(&mut self, max_bytes: u32) -> Option<Packet> {
        self.dequeue(max_bytes)
    }

    /// Drain every packet without transmitting, for the shutdown path.
    pub fn purge(&mut self) -> Vec<Packet> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpf_pool::PacketPool;
    use bpf_types::TimestampMode;

    fn mk_packet(pool: &PacketPool, len: u32) -> Packet {
        let mut p = pool.get(TimestampMode::None).unwrap();
        p.meta.virtual_length = len;
        p.data = vec![0u8; len as usize];
        p
    }

    #[test]
    fn fifo_preserves_order() {
        let pool = PacketPool::new_standalone();
        let mut q = PacketQueue::with_defaults(DropPolicy::Head);
        let p1 = mk_packet(&pool, 1000);
        let p2 = mk_packet(&pool, 1000);
        let p3 = mk_packet(&pool, 1000);
        let (i1, i2, i3) = (p1.index(), p2.index(), p3.index());
        q.enqueue(p1).unwrap();
        q.enqueue(p2).unwrap();
        q.enqueue(p3).unwrap();
        assert_eq!(q.dequeue(1500).unwrap().index(), i1);
        assert_eq!(q.dequeue(1500).unwrap().index(), i2);
        assert_eq!(q.dequeue(1500).unwrap().index(), i3);
        assert!(q.is_empty());
    }

    #[test]
    fn no_drop_rejects_when_full() {
        let pool = PacketPool::new_standalone();
        let mut q = PacketQueue::new(QueueOrdering::Insertion, DropPolicy::NoDrop, 1);
        let p1 = mk_packet(&pool, 100);
        q.enqueue(p1).unwrap();
        let p2 = mk_packet(&pool, 100);
        let (returned, err) = q.enqueue(p2).unwrap_err();
        assert_eq!(err, PacketQueueError::FullNoDrop);
        assert_eq!(returned.len(), 100);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn head_drop_evicts_oldest_and_keeps_depth() {
        let pool = PacketPool::new_standalone();
        let mut q = PacketQueue::new(QueueOrdering::Insertion, DropPolicy::Head, 2);
        let p1 = mk_packet(&pool, 1000);
        let p2 = mk_packet(&pool, 1000);
        let p3 = mk_packet(&pool, 1000);
        let i2 = p2.index();
        let i3 = p3.index();
        q.enqueue(p1).unwrap();
        q.enqueue(p2).unwrap();
        let evicted = q.enqueue(p3).unwrap();
        assert!(evicted.is_some());
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue(2000).unwrap().index(), i2);
        assert_eq!(q.dequeue(2000).unwrap().index(), i3);
    }

    #[test]
    fn dequeue_skips_nothing_when_head_too_large() {
        let pool = PacketPool::new_standalone();
        let mut q = PacketQueue::with_defaults(DropPolicy::Head);
        let big = mk_packet(&pool, 2000);
        q.enqueue(big).unwrap();
        assert!(q.dequeue(1000).is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn requeue_at_head_restores_front_position() {
        let pool = PacketPool::new_standalone();
        let mut q = PacketQueue::with_defaults(DropPolicy::Head);
        let p1 = mk_packet(&pool, 100);
        let p2 = mk_packet(&pool, 100);
        let i1 = p1.index();
        q.enqueue(p1).unwrap();
        q.enqueue(p2).unwrap();
        let dequeued = q.dequeue(1000).unwrap();
        assert_eq!(dequeued.index(), i1);
        q.requeue_at_head(dequeued);
        assert_eq!(q.peek().unwrap().index(), i1);
    }
}
