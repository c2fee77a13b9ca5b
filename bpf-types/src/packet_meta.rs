//! The metadata tail carried by every packet in the arena.

use crate::dst_vec::DstVec;
use crate::latency_class::LatencyClass;

/// How a pool operation should stamp a packet's receive time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// Leave the receive time untouched.
    None,
    /// Stamp with the current time.
    Now,
    /// Copy the receive time from the packet being cloned.
    Copy,
}

/// A 20-bit packet identifier, masked on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketId(u32);

impl PacketId {
    const MASK: u32 = (1 << 20) - 1;

    #[inline]
    pub fn new(raw: u32) -> Self {
        PacketId(raw & Self::MASK)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// The metadata tail the component design describes trailing every packet:
/// everything about a packet except the bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketMeta {
    /// Tag identifying the component that currently owns the packet;
    /// instrumentation only, never consulted for forwarding decisions.
    pub owner_tag: u16,
    pub latency_class: LatencyClass,
    pub recv_time_ns: u64,
    pub packet_id: PacketId,
    /// Time-to-go deadline, in nanoseconds since the UNIX epoch, if any.
    pub ttg_deadline_ns: Option<u64>,
    pub dst_vec: DstVec,
    /// Length used for backpressure accounting; equal to the real byte
    /// length except for compressed zombies, where it may far exceed it.
    pub virtual_length: u32,
    /// Index into the process-local "last seen" debug table. Instrumentation
    /// only; MUST NOT affect packet semantics.
    pub last_location: u16,
}

impl PacketMeta {
    pub fn new(latency_class: LatencyClass, dst_vec: DstVec, recv_time_ns: u64) -> Self {
        PacketMeta {
            owner_tag: 0,
            latency_class,
            recv_time_ns,
            packet_id: PacketId::new(0),
            ttg_deadline_ns: None,
            dst_vec,
            virtual_length: 0,
            last_location: 0,
        }
    }
}
