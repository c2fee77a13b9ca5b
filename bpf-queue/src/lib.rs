//! # Per-Destination Queue Management
//!
//! ## Purpose
//!
//! `bpf-queue` is where packets actually sit while they wait to be
//! forwarded. [`BinQueueMgr`] owns one [`Queue`] per latency class for a
//! single destination bin, enforcing drop policy and keeping the shared
//! [`QueueDepths`] table in lockstep with what's really queued.
//! [`QueueStore`] is the container of `BinQueueMgr`s keyed by destination,
//! plus the neighbor-advertised depth tables the gradient scheduler reads.
//!
//! ## What This Crate Does NOT Contain
//! - The gradient computation and solution selection (`bpf-forwarder`).
//! - The ZLR/ASAP/NPLB *decision* logic (`bpf-algorithms`) — this crate only
//!   turns their decisions into queue mutations.
//! - QLAM wire encoding (`bpf-codec`).

pub mod bin_queue_mgr;
pub mod drop_policy;
pub mod error;
pub mod packet_queue;
pub mod queue;
pub mod queue_depths;
pub mod queue_store;
pub mod zombie_queue;

pub use bin_queue_mgr::{BinQueueMgr, DequeueOutcome};
pub use drop_policy::DropPolicy;
pub use error::QueueError;
pub use packet_queue::{PacketQueue, QueueOrdering};
pub use queue::Queue;
pub use queue_depths::{BinDepth, QueueDepths, QueueDepthsError};
pub use queue_store::{BinConfig, QueueStore};
pub use zombie_queue::ZombieQueue;
