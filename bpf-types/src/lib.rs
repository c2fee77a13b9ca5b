//! # Backpressure Forwarding Core — Data Model
//!
//! ## Purpose
//!
//! This crate contains the data-model layer of the backpressure forwarding core:
//! the value types that every other crate in the workspace shares, and nothing
//! that touches an arena, a socket, or a clock.
//!
//! - [`LatencyClass`] — the ten-way forwarding priority enumeration.
//! - [`BinIndex`] — the compact destination identifier handed in by the
//!   (external, opaque) BinMap.
//! - [`DstVec`] — a multicast destination bitvector over bins.
//! - [`Gradient`] — a single (destination, neighbor) backpressure differential.
//! - [`PacketMeta`] — the metadata tail every `Packet` in `bpf-pool` carries.
//!
//! ## What This Crate Does NOT Contain
//! - The packet arena or its shared-memory ring (belongs in `bpf-pool`).
//! - Queue storage or drop policy (belongs in `bpf-queue`).
//! - Wire encoding (belongs in `bpf-codec`).

pub mod bin_index;
pub mod dst_vec;
pub mod gradient;
pub mod latency_class;
pub mod packet_meta;

pub use bin_index::BinIndex;
pub use dst_vec::DstVec;
pub use gradient::Gradient;
pub use latency_class::LatencyClass;
pub use packet_meta::{PacketId, PacketMeta, TimestampMode};
