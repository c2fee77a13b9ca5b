//! # QLAM Wire Codec
//!
//! ## Purpose
//!
//! Byte-exact serialization of a node's per-destination [`QueueDepths`]
//! advertisement (§4.2, §6) for the periodic QLAM frame sent to every
//! neighbor, and the reorder-tolerant decode path that applies a received
//! frame back into a neighbor's depth table.
//!
//! This crate fixes one of the two open questions the component design
//! leaves explicit: the original carries `ls_bytes` in 24 bits at some
//! call sites and 32 at others; every call site here uses the uniform
//! 24-bit layout in [`constants::ENTRY_LEN`].
//!
//! ## What This Crate Does NOT Contain
//! - The decision of *when* to emit or apply a QLAM frame (`bpf-forwarder`).
//! - Storage of the depths themselves (`bpf-queue::QueueDepths`).

pub mod constants;
pub mod qlam;
pub mod seq_window;

pub use constants::{ENTRY_LEN, HEADER_LEN, LS_BYTES_MAX, MAX_ENTRIES, QLAM_TYPE_TAG};
pub use qlam::{decode_frame, encode_frame, CodecError, NeighborQlam};
pub use seq_window::SeqTracker;
