//! Reference UDP [`Transport`] implementation. Packet bytes (encoded per
//! [`crate::envelope`]) are exchanged one datagram per packet; the "send
//! queue" the gradient scheduler checks via [`Transport::xmit_queue_size`]
//! is a soft in-flight byte ceiling this implementation enforces itself,
//! since a raw UDP socket has no send queue of its own to report.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bpf_pool::Packet;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::envelope::{self, Frame};
use crate::error::TransportError;
use crate::traits::{CapacityEstimate, NeighborId, SendOutcome, Transport};

/// Soft per-neighbor in-flight byte ceiling before [`Transport::send_packet`]
/// starts refusing sends, triggering the requeue-at-head/back-off-one-tick
/// path at the call site (§7).
pub const DEFAULT_MAX_BYTES_IN_FLIGHT: u64 = 1 << 20;

struct NeighborState {
    addr: SocketAddr,
    in_flight: AtomicU64,
}

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    neighbors: DashMap<NeighborId, NeighborState>,
    addr_to_neighbor: DashMap<SocketAddr, NeighborId>,
    max_bytes_in_flight: u64,
    capacity_estimates: Mutex<Vec<CapacityEstimate>>,
    dropped_packets: Mutex<Vec<Packet>>,
}

impl UdpTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_capacity(addr, DEFAULT_MAX_BYTES_IN_FLIGHT).await
    }

    pub async fn bind_with_capacity(
        addr: &str,
        max_bytes_in_flight: u64,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpTransport {
            socket: Arc::new(socket),
            neighbors: DashMap::new(),
            addr_to_neighbor: DashMap::new(),
            max_bytes_in_flight,
            capacity_estimates: Mutex::new(Vec::new()),
            dropped_packets: Mutex::new(Vec::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Register or update a neighbor's transport-level address.
    pub fn add_neighbor(&self, neighbor: NeighborId, addr: SocketAddr) {
        self.addr_to_neighbor.insert(addr, neighbor);
        self.neighbors
            .insert(neighbor, NeighborState { addr, in_flight: AtomicU64::new(0) });
    }

    /// Record a capacity-estimate sample for the scheduler to later drain.
    /// The reference transport has no real link-capacity probing of its
    /// own; this is the hook a deployment-specific estimator feeds.
    pub fn record_capacity_estimate(&self, estimate: CapacityEstimate) {
        self.capacity_estimates.lock().push(estimate);
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_packet(
        &self,
        neighbor: NeighborId,
        pkt: Packet,
    ) -> Result<SendOutcome, TransportError> {
        let Some(state) = self.neighbors.get(&neighbor) else {
            return Err(TransportError::UnknownNeighbor(neighbor.0));
        };

        let frame = envelope::encode_data(&pkt.meta, &pkt.data);
        let frame_len = frame.len() as u64;

        let prior = state.in_flight.fetch_add(frame_len, Ordering::SeqCst);
        if prior + frame_len > self.max_bytes_in_flight {
            state.in_flight.fetch_sub(frame_len, Ordering::SeqCst);
            warn!(neighbor = neighbor.0, "transport refusing send, in-flight ceiling reached");
            return Ok(SendOutcome::Refused(pkt));
        }

        let addr = state.addr;
        drop(state);
        let result = self.socket.send_to(&frame, addr).await;
        if let Some(state) = self.neighbors.get(&neighbor) {
            state.in_flight.fetch_sub(frame_len, Ordering::SeqCst);
        }
        result?;
        Ok(SendOutcome::Accepted)
    }

    async fn xmit_queue_size(&self, neighbor: NeighborId) -> Result<u64, TransportError> {
        self.neighbors
            .get(&neighbor)
            .map(|n| n.in_flight.load(Ordering::SeqCst))
            .ok_or(TransportError::UnknownNeighbor(neighbor.0))
    }

    async fn drain_capacity_estimates(&self) -> Vec<CapacityEstimate> {
        std::mem::take(&mut *self.capacity_estimates.lock())
    }

    async fn drain_dropped_packets(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.dropped_packets.lock())
    }

    async fn send_qlam(&self, neighbor: NeighborId, qlam_bytes: Vec<u8>) -> Result<(), TransportError> {
        let addr = self
            .neighbors
            .get(&neighbor)
            .map(|n| n.addr)
            .ok_or(TransportError::UnknownNeighbor(neighbor.0))?;
        let frame = envelope::wrap_qlam(qlam_bytes);
        self.socket.send_to(&frame, addr).await?;
        Ok(())
    }

    async fn recv_frame(&self) -> Result<(Option<NeighborId>, Frame), TransportError> {
        let mut scratch = [0u8; 65536];
        let (n, src) = self.socket.recv_from(&mut scratch).await?;
        let neighbor = self.addr_to_neighbor.get(&src).map(|entry| *entry);
        if neighbor.is_none() {
            debug!(%src, "datagram from unregistered neighbor address");
        }
        let frame = envelope::decode(&scratch[..n])?;
        Ok((neighbor, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpf_types::{BinIndex, DstVec, LatencyClass, PacketMeta};

    fn packet(bytes: &[u8]) -> Packet {
        let pool = bpf_pool::PacketPool::new_standalone();
        let mut pkt = pool.get(bpf_types::TimestampMode::None).unwrap();
        pkt.meta.latency_class = LatencyClass::NormalLatency;
        pkt.meta.dst_vec = DstVec::single(BinIndex(1));
        pkt.data = bytes.to_vec();
        pkt
    }

    #[tokio::test]
    async fn unknown_neighbor_is_rejected() {
        let t = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let err = t.send_packet(NeighborId(1), packet(b"hi")).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownNeighbor(1)));
    }

    #[tokio::test]
    async fn send_over_capacity_is_refused_without_error() {
        let t = UdpTransport::bind_with_capacity("127.0.0.1:0", 4).await.unwrap();
        let peer = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        t.add_neighbor(NeighborId(1), peer_addr);

        let outcome = t.send_packet(NeighborId(1), packet(b"0123456789")).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Refused(_)));
    }

    #[tokio::test]
    async fn send_and_receive_round_trip() {
        let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let b_addr = b.local_addr().unwrap();
        a.add_neighbor(NeighborId(7), b_addr);

        let outcome = a.send_packet(NeighborId(7), packet(b"payload")).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Accepted));

        let (_neighbor, frame) = b.recv_frame().await.unwrap();
        match frame {
            Frame::Data { payload, .. } => assert_eq!(payload, b"payload"),
            _ => panic!("expected data frame"),
        }
    }
}
