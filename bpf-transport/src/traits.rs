//! The external collaborators the forwarding core treats as opaque per §6:
//! the neighbor transport, the packet ingress/egress edge, and the BinMap
//! identifier translator. The core is generic over all three; only the
//! reference UDP implementation in [`crate::udp`] nails down a concrete
//! transport.

use async_trait::async_trait;
use bpf_pool::Packet;
use bpf_types::BinIndex;

use crate::envelope::Frame;
use crate::error::TransportError;

/// Opaque handle identifying a neighboring node on the overlay. Distinct
/// from `BinIndex`, which identifies a forwarding destination: one
/// neighbor may carry traffic for many bins, and a bin's traffic may
/// route over more than one neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborId(pub u32);

/// A single capacity estimate sample handed to the scheduler by a
/// transport's capacity-estimate callback (§6): the channel's raw bit
/// rate, the transport's estimate of deliverable throughput, and the
/// congestion-control loop duration the estimate is valid for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityEstimate {
    pub neighbor: NeighborId,
    pub chan_bps: u64,
    pub trans_bps: u64,
    pub ccl_secs: f64,
}

/// Outcome of [`Transport::send_packet`]. `Refused` carries the packet back
/// — Rust has no out-parameter to hand ownership back through a bare
/// `bool`, so the component design's "`false` leaves ownership with the
/// caller" becomes the packet living inside this variant instead.
pub enum SendOutcome {
    Accepted,
    Refused(Packet),
}

/// The transport contract the gradient scheduler consumes (§6), reinterpreted
/// as `async fn`s: the original select-multiplexed `fd, events` suspension
/// point becomes whatever the implementation awaits internally, and the two
/// callbacks become channels a caller polls rather than function pointers
/// registered at construction.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transfer `pkt` to `neighbor`. A refusal (the transport's send queue
    /// is full) hands the packet back via [`SendOutcome::Refused`]; the
    /// caller must requeue it at head and back off one tick (§7).
    async fn send_packet(
        &self,
        neighbor: NeighborId,
        pkt: Packet,
    ) -> Result<SendOutcome, TransportError>;

    /// The transport's pending byte count for `neighbor`, used by the
    /// gradient scheduler's link-capacity check.
    async fn xmit_queue_size(&self, neighbor: NeighborId) -> Result<u64, TransportError>;

    /// Drain queued capacity-estimate samples since the last call.
    async fn drain_capacity_estimates(&self) -> Vec<CapacityEstimate>;

    /// Drain packets the transport discarded on its own accord (e.g. a
    /// connection reset); ownership of each returned packet passes back to
    /// the caller, which recycles it.
    async fn drain_dropped_packets(&self) -> Vec<Packet>;

    /// Broadcast-style send of an already-encoded QLAM advertisement to one
    /// neighbor. Kept distinct from `send_packet` since QLAM frames never
    /// flow through the packet pool and are never requeued on refusal
    /// (§4.10).
    async fn send_qlam(&self, neighbor: NeighborId, qlam_bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Block until the next frame (QLAM or data) arrives from any neighbor.
    /// This is the core's suspension point in lieu of raw `fd, events`
    /// select multiplexing (§6).
    async fn recv_frame(&self) -> Result<(Option<NeighborId>, Frame), TransportError>;
}

/// Packet ingress/egress at the edge of the forwarding core (§6). A
/// reference implementation necessarily stands in for the kernel-level
/// ingress/egress path the component design places out of scope (§1).
#[async_trait]
pub trait EdgeIn: Send + Sync {
    /// Write received bytes into `pkt` starting at `offset`, returning the
    /// number of bytes written, or an error if nothing was available.
    async fn recv(&self, pkt: &mut Packet, offset: usize) -> Result<usize, TransportError>;
}

#[async_trait]
pub trait EdgeOut: Send + Sync {
    /// Emit `pkt`'s bytes, returning the number of bytes written.
    async fn send(&self, pkt: &Packet) -> Result<usize, TransportError>;
}

/// Translates between the wire's raw destination identifier and a compact
/// [`BinIndex`] (§3). The component design treats the identifier space on
/// the other side of this trait as opaque — group names, IP multicast
/// addresses, application-level topic strings, whatever the deployment
/// uses — so this crate only fixes the shape of the translation, not what
/// it translates from.
pub trait BinMap: Send + Sync {
    /// Resolve a previously-registered bin, or `None` if unknown (§7's
    /// "out-of-range BinIndex": a warning and no-op at the call site, not
    /// an error here).
    fn resolve(&self, bin: BinIndex) -> Option<NeighborId>;

    /// Register or update which neighbor a bin's unicast traffic routes
    /// through.
    fn bind(&self, bin: BinIndex, neighbor: NeighborId);
}
