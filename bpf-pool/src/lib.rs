//! # Packet Arena
//!
//! ## Purpose
//!
//! Owns the fixed-count arena of packet slots every other crate in the
//! workspace borrows from. A `Packet` is a small, `Copy`-able handle into
//! this arena — an index plus a metadata snapshot — never an owned heap
//! allocation the caller manages directly. This is deliberate: the
//! component design treats packets as never allocated at runtime, so the
//! handle type must make "where did this come from" unrepresentable other
//! than via [`PacketPool::get`], [`PacketPool::clone_packet`] and friends.
//!
//! ## Architecture
//!
//! ```text
//! PacketPool
//!  ├─ local ring   (process-local Vec<u32> of free slot indices, ~1024)
//!  └─ shared ring  (cross-process ring of free slot indices, ~135168)
//! ```
//!
//! `get` pops from the local ring, refilling a batch from the shared ring
//! when empty. `recycle` pushes to the local ring, spilling a batch back to
//! the shared ring when full. The shared ring is only present when the
//! `shared-memory` feature is enabled; without it the pool behaves as a
//! single-process arena sized to the local ring's refill batch.

pub mod error;
pub mod packet;
pub mod pool;
mod ring;

#[cfg(feature = "shared-memory")]
pub mod shm_ring;

pub use error::PoolError;
pub use packet::Packet;
pub use pool::{PacketPool, PoolStats};
