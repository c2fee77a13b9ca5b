//! # Gradient Scheduler / Forwarder
//!
//! ## Purpose
//!
//! This crate wires every other workspace member into the actual main loop
//! (§4.10, §5): classify edge-ingress bytes, admit them into `bpf-queue`,
//! compute gradient solutions against neighbor-advertised depths, dispatch
//! through a `bpf-transport::Transport`, and periodically emit QLAM
//! advertisements of this node's own depths. [`scheduler::Forwarder`] owns
//! all of it; the `bpf-forwarder` binary (`src/bin/main.rs`) is a thin CLI
//! and logging shell around it.
//!
//! ## What This Crate Does NOT Contain
//! - Queue mechanics, ZLR/ASAP/NPLB decisions, QLAM codec, or the transport
//!   itself — those live in the crates this one depends on.

pub mod classify;
pub mod error;
pub mod scheduler;
pub mod topology;

pub use classify::{Classifier, HeaderClassifier};
pub use error::ForwarderError;
pub use scheduler::Forwarder;
pub use topology::Topology;
