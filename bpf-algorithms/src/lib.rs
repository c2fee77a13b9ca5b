//! # Queue-Shaping Decision Engines
//!
//! ## Purpose
//!
//! Pure decision engines for the three queue-shaping algorithms overlaid on
//! raw backpressure: [`zlr`] (Zombie Latency Reduction), [`asap`]
//! (Anti-Starvation with Artificial Packets) and [`nplb`] (No Packet Left
//! Behind). None of these types touch a `Packet`, a `Queue`, or a clock —
//! every call takes an explicit [`clock::Timestamp`] and the byte counts it
//! needs, and returns a decision (how many zombie bytes to inject, or a
//! depth bias to apply). `bpf-queue::BinQueueMgr` owns one instance of each
//! applicable engine per destination and is the only thing that turns a
//! decision into an actual queue mutation — this keeps the cyclic
//! `BinQueueMgr <-> ZLR/ASAP` reference the component design calls out from
//! ever needing to exist: the engines are callees, not holders of a
//! back-reference.
//!
//! ZLR and ASAP/NPLB are not mutually exclusive with each other (both run),
//! but ASAP and NPLB are mutually exclusive per bin — see [`Algorithm`].

pub mod asap;
pub mod clock;
pub mod nplb;
pub mod zlr;

pub use asap::{AsapState, AsapTuning};
pub use nplb::NplbState;
pub use zlr::{FastRecoveryState, ZlrLane, ZlrTuning};

/// Per-bin anti-starvation algorithm selection. ZLR always runs alongside
/// whichever of these is selected; `Base` runs neither ASAP nor NPLB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiStarvationAlgorithm {
    #[default]
    Base,
    Asap,
    Nplb,
}
