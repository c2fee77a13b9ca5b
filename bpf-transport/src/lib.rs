//! # Transport / Edge Contracts
//!
//! ## Purpose
//!
//! The component design treats the neighbor transport, the packet
//! ingress/egress edge, and the destination-identifier translator
//! (`BinMap`) as external collaborators the core is parameterized over
//! (§6). This crate defines those three contracts as traits plus one
//! reference implementation of each, so the rest of the workspace (and the
//! `bpf-forwarder` binary) has something concrete to run without needing a
//! kernel-level integration:
//!
//! - [`traits::Transport`] / [`udp::UdpTransport`] — the per-neighbor send
//!   path, backed by UDP.
//! - [`traits::EdgeIn`] / [`traits::EdgeOut`] / [`edge::UdpEdge`] — the
//!   local application ingress/egress boundary.
//! - [`traits::BinMap`] / [`bin_map::InMemoryBinMap`] — destination
//!   identifier to neighbor translation.
//! - [`envelope`] — the wire framing that lets one socket carry both QLAM
//!   advertisements and data packets.
//!
//! ## What This Crate Does NOT Contain
//! - The gradient scheduler that decides *when* and *what* to send
//!   (`bpf-forwarder`).
//! - QLAM frame encoding/decoding itself (`bpf-codec`; this crate only
//!   frames it for the wire).

pub mod bin_map;
pub mod edge;
pub mod envelope;
pub mod error;
pub mod traits;
pub mod udp;

pub use bin_map::InMemoryBinMap;
pub use edge::UdpEdge;
pub use error::TransportError;
pub use traits::{BinMap, CapacityEstimate, EdgeIn, EdgeOut, NeighborId, SendOutcome, Transport};
pub use envelope::Frame;
pub use udp::UdpTransport;
