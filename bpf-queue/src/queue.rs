//! The per-class queue variant: either a `PacketQueue` or a packet-less
//! `ZombieQueue`, chosen per [`bpf_types::LatencyClass::is_zombie_class`].

use crate::packet_queue::PacketQueue;
use crate::zombie_queue::ZombieQueue;
use bpf_pool::{Packet, PacketPool, PoolError};
use bpf_types::DstVec;

pub enum Queue {
    Packet(PacketQueue),
    Zombie(ZombieQueue),
}

impl Queue {
    pub fn is_zombie(&self) -> bool {
        matches!(self, Queue::Zombie(_))
    }

    pub fn as_packet_queue(&self) -> Option<&PacketQueue> {
        match self {
            Queue::Packet(q) => Some(q),
            Queue::Zombie(_) => None,
        }
    }

    pub fn as_packet_queue_mut(&mut self) -> Option<&mut PacketQueue> {
        match self {
            Queue::Packet(q) => Some(q),
            Queue::Zombie(_) => None,
        }
    }

    pub fn as_zombie_queue_mut(&mut self) -> Option<&mut ZombieQueue> {
        match self {
            Queue::Zombie(q) => Some(q),
            Queue::Packet(_) => None,
        }
    }

    /// Bytes available to dequeue right now for `dst_vec`, used by the
    /// ordered-class poller to find the first nonempty class.
    pub fn available_bytes(&self, dst_vec: DstVec) -> u32 {
        match self {
            Queue::Packet(q) => q.peek_virtual_length().unwrap_or(0),
            Queue::Zombie(q) => q.bytes_for(dst_vec),
        }
    }

    pub fn dequeue(&mut self, pool: &PacketPool, max_bytes: u32, dst_vec: DstVec) -> Result<Option<Packet>, PoolError> {
        match self {
            Queue::Packet(q) => Ok(q.dequeue(max_bytes)),
            Queue::Zombie(q) => q.dequeue(pool, max_bytes, dst_vec),
        }
    }
}
