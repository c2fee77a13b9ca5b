//! Reference [`EdgeIn`]/[`EdgeOut`] adapter over a UDP socket, standing in
//! for the kernel-level packet ingress/egress path the component design
//! places out of scope (§1). A real deployment's edge is a raw socket, a
//! TUN device, or an in-kernel hook; this one exists so the forwarding core
//! has something concrete to drive in tests and in the demo binary.

use async_trait::async_trait;
use bpf_pool::Packet;
use tokio::net::UdpSocket;

use crate::error::TransportError;
use crate::traits::{EdgeIn, EdgeOut};

pub struct UdpEdge {
    socket: UdpSocket,
}

impl UdpEdge {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpEdge { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl EdgeIn for UdpEdge {
    async fn recv(&self, pkt: &mut Packet, offset: usize) -> Result<usize, TransportError> {
        if pkt.data.len() < offset {
            pkt.data.resize(offset, 0);
        }
        let mut scratch = [0u8; 65536];
        let (n, _src) = self.socket.recv_from(&mut scratch).await?;
        pkt.data.truncate(offset);
        pkt.data.extend_from_slice(&scratch[..n]);
        Ok(n)
    }
}

#[async_trait]
impl EdgeOut for UdpEdge {
    async fn send(&self, pkt: &Packet) -> Result<usize, TransportError> {
        let n = self.socket.send(&pkt.data).await?;
        Ok(n)
    }
}
