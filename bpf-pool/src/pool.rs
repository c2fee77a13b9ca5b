//! The fixed-count packet arena.

use crate::error::PoolError;
use crate::packet::Packet;
use crate::ring::{LocalRing, LOCAL_RING_CAPACITY, REFILL_BATCH};
use bpf_types::{PacketMeta, TimestampMode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{trace, warn};

#[cfg(feature = "shared-memory")]
use crate::shm_ring::SharedRing;

/// Default arena size when the `shared-memory` feature is disabled: the
/// local ring's capacity plus one refill batch of headroom, so a
/// single-process test pool behaves like a modest slice of the full
/// ~135168-slot cross-process arena.
const STANDALONE_ARENA_SLOTS: usize = LOCAL_RING_CAPACITY + REFILL_BATCH;

struct Slot {
    meta: Option<PacketMeta>,
    data: Vec<u8>,
    refcount: AtomicU32,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            meta: None,
            data: Vec::new(),
            refcount: AtomicU32::new(0),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    pub gets: u64,
    pub recycles: u64,
    pub local_refills: u64,
    pub local_spills: u64,
    pub exhaustions: u64,
}

/// The arena every `Packet` handle is backed by.
///
/// Mirrors the component design's two-layer allocator: a process-local
/// [`LocalRing`] of free indices, refilled from (and spilled to) a
/// cross-process shared ring when the `shared-memory` feature is enabled.
/// Without that feature the pool behaves as a single-process arena sized to
/// [`STANDALONE_ARENA_SLOTS`], which is what the unit and property tests
/// in this workspace run against.
pub struct PacketPool {
    slots: Vec<Mutex<Slot>>,
    local: Mutex<LocalRing>,
    #[cfg(feature = "shared-memory")]
    shared: SharedRing,
    stats: Mutex<PoolStats>,
}

impl PacketPool {
    /// Construct a standalone pool (no shared-memory backing). Used by tests
    /// and by any process that doesn't need cross-process packet sharing.
    pub fn new_standalone() -> Self {
        let slots = (0..STANDALONE_ARENA_SLOTS).map(|_| Mutex::new(Slot::empty())).collect();
        let mut local = LocalRing::new(LOCAL_RING_CAPACITY);
        for i in 0..STANDALONE_ARENA_SLOTS as u32 {
            local.push(i);
        }
        PacketPool {
            slots,
            local: Mutex::new(local),
            #[cfg(feature = "shared-memory")]
            shared: SharedRing::new_private(STANDALONE_ARENA_SLOTS),
            stats: Mutex::new(PoolStats::default()),
        }
    }

    /// Attach to (or create) the shared-memory-backed arena.
    #[cfg(feature = "shared-memory")]
    pub fn new_shared(shm_name: &str, sem_name: &str, total_slots: usize) -> Result<Self, PoolError> {
        let shared = SharedRing::open_or_create(shm_name, sem_name, total_slots)
            .map_err(|e| PoolError::SharedMemory(e.to_string()))?;
        let slots = (0..total_slots).map(|_| Mutex::new(Slot::empty())).collect();
        Ok(PacketPool {
            slots,
            local: Mutex::new(LocalRing::new(LOCAL_RING_CAPACITY)),
            shared,
            stats: Mutex::new(PoolStats::default()),
        })
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    fn alloc_index(&self) -> Result<u32, PoolError> {
        let mut local = self.local.lock();
        if let Some(idx) = local.pop() {
            return Ok(idx);
        }

        #[cfg(feature = "shared-memory")]
        {
            if let Some(batch) = self.shared.take_batch(REFILL_BATCH) {
                local.extend_batch(batch);
                self.stats.lock().local_refills += 1;
                if let Some(idx) = local.pop() {
                    return Ok(idx);
                }
            }
        }

        self.stats.lock().exhaustions += 1;
        warn!("packet pool exhausted: no free slots in local or shared ring");
        Err(PoolError::Exhausted)
    }

    fn free_index(&self, idx: u32) {
        let mut local = self.local.lock();
        local.push(idx);
        if local.is_full() {
            let batch = local.drain_batch(REFILL_BATCH);
            #[cfg(feature = "shared-memory")]
            {
                self.shared.return_batch(batch);
                self.stats.lock().local_spills += 1;
            }
            #[cfg(not(feature = "shared-memory"))]
            {
                // No shared ring to spill into: push the batch straight back.
                local.extend_batch(batch);
            }
        }
    }

    /// Returns a zero-length slot, stamped per `timestamp_mode`.
    pub fn get(&self, timestamp_mode: TimestampMode) -> Result<Packet, PoolError> {
        let idx = self.alloc_index()?;
        let recv_time_ns = match timestamp_mode {
            TimestampMode::Now => now_ns(),
            _ => 0,
        };
        let meta = PacketMeta::new(bpf_types::LatencyClass::NormalLatency, bpf_types::DstVec::EMPTY, recv_time_ns);
        {
            let mut slot = self.slots[idx as usize].lock();
            slot.data.clear();
            slot.meta = Some(meta.clone());
            slot.refcount.store(1, Ordering::SeqCst);
        }
        self.stats.lock().gets += 1;
        trace!(idx, "packet pool get");
        Ok(Packet {
            index: idx,
            meta,
            data: Vec::new(),
        })
    }

    /// Deep copy of bytes and metadata into a fresh slot.
    ///
    /// When `full_copy` is true the caller is additionally promising to
    /// preserve transmission-side state (e.g. per-destination completion
    /// tracking for a multicast split) on the cloned packet themselves —
    /// this crate has no notion of that state, so it only copies the
    /// metadata tail and the bytes.
    pub fn clone_packet(
        &self,
        pkt: &Packet,
        _full_copy: bool,
        timestamp_mode: TimestampMode,
    ) -> Result<Packet, PoolError> {
        let idx = self.alloc_index()?;
        let mut meta = pkt.meta.clone();
        meta.recv_time_ns = match timestamp_mode {
            TimestampMode::Now => now_ns(),
            TimestampMode::Copy => pkt.meta.recv_time_ns,
            TimestampMode::None => meta.recv_time_ns,
        };
        let data = pkt.data.clone();
        {
            let mut slot = self.slots[idx as usize].lock();
            slot.data = data.clone();
            slot.meta = Some(meta.clone());
            slot.refcount.store(1, Ordering::SeqCst);
        }
        self.stats.lock().gets += 1;
        Ok(Packet { index: idx, meta, data })
    }

    /// Clone only the metadata tail; the returned packet has zero-length data.
    pub fn clone_header_only(&self, pkt: &Packet, timestamp_mode: TimestampMode) -> Result<Packet, PoolError> {
        let idx = self.alloc_index()?;
        let mut meta = pkt.meta.clone();
        meta.recv_time_ns = match timestamp_mode {
            TimestampMode::Now => now_ns(),
            TimestampMode::Copy => pkt.meta.recv_time_ns,
            TimestampMode::None => meta.recv_time_ns,
        };
        {
            let mut slot = self.slots[idx as usize].lock();
            slot.data.clear();
            slot.meta = Some(meta.clone());
            slot.refcount.store(1, Ordering::SeqCst);
        }
        self.stats.lock().gets += 1;
        Ok(Packet { index: idx, meta, data: Vec::new() })
    }

    /// Increments the slot's refcount and returns a handle referring to the
    /// same slot, used when two components must hand a packet down a shared
    /// pipeline without copying bytes.
    pub fn shallow_copy(&self, pkt: &Packet) -> Packet {
        let slot = self.slots[pkt.index as usize].lock();
        slot.refcount.fetch_add(1, Ordering::SeqCst);
        Packet {
            index: pkt.index,
            meta: pkt.meta.clone(),
            data: pkt.data.clone(),
        }
    }

    /// Decrements the slot's refcount; at zero the slot returns to the pool.
    pub fn recycle(&self, pkt: Packet) {
        let should_free = {
            let slot = self.slots[pkt.index as usize].lock();
            slot.refcount.fetch_sub(1, Ordering::SeqCst) == 1
        };
        if should_free {
            let mut slot = self.slots[pkt.index as usize].lock();
            slot.meta = None;
            slot.data.clear();
            drop(slot);
            self.free_index(pkt.index);
            self.stats.lock().recycles += 1;
        }
    }

    /// Inverse of the slot index: used to translate references sent over
    /// inter-process FIFOs back into live handles.
    pub fn packet_from_index(&self, idx: u32) -> Result<Packet, PoolError> {
        if idx as usize >= self.slots.len() {
            return Err(PoolError::IndexOutOfRange(idx));
        }
        let slot = self.slots[idx as usize].lock();
        let meta = slot
            .meta
            .clone()
            .ok_or(PoolError::SlotNotAllocated(idx))?;
        Ok(Packet {
            index: idx,
            meta,
            data: slot.data.clone(),
        })
    }
}

fn now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
