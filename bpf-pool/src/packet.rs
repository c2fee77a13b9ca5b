use bpf_types::PacketMeta;

/// A handle into the packet arena: an opaque slot index plus a metadata
/// snapshot and the packet's bytes.
///
/// `Packet` is intentionally not `Copy` — the metadata and bytes are
/// logically owned data once handed out by [`crate::PacketPool::get`] — but
/// it carries no destructor either. Recycling is an explicit call to
/// [`crate::PacketPool::recycle`], matching the component design's manual
/// reference-counting discipline rather than Rust's RAII: a caller that
/// forgets to recycle leaks a slot, exactly as the arena model expects
/// "callers establish single-owner discipline" to mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub(crate) index: u32,
    pub meta: PacketMeta,
    pub data: Vec<u8>,
}

impl Packet {
    /// The arena slot this handle refers to. Used to translate references
    /// sent over inter-process FIFOs via `PacketPool::packet_from_index`.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Debug-only: stamp the per-component "last seen" tag. Instrumentation
    /// only, MUST NOT affect forwarding semantics.
    pub fn mark_location(&mut self, location_tag: u16) {
        self.meta.last_location = location_tag;
    }
}
