//! Encode/decode for the QLAM wire frame (§6):
//!
//! ```text
//! type_tag: u8 | seq: u16 BE | count: u8 | entries[count]
//! entry: bin_id: u8 | total_bytes: u32 BE | ls_bytes: u24 BE
//! ```
//!
//! Deserialization writes only the bins named in the frame, leaving every
//! other bin untouched, and discards a frame whose sequence number falls
//! within the 128-entry "before" window of the most recently accepted one
//! without mutating any state — see [`crate::seq_window::SeqTracker`].

use crate::constants::{ENTRY_LEN, HEADER_LEN, LS_BYTES_MAX, MAX_ENTRIES, QLAM_TYPE_TAG};
use crate::seq_window::SeqTracker;
use bpf_queue::{BinDepth, QueueDepths, QueueDepthsError};
use bpf_types::BinIndex;
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame too short: {len} bytes, need at least {need}")]
    TooShort { len: usize, need: usize },
    #[error("unexpected type tag 0x{0:02x}")]
    WrongTypeTag(u8),
    #[error("frame declares {declared} entries but only {actual} bytes remain")]
    TruncatedEntries { declared: usize, actual: usize },
    #[error("queue depths error applying frame: {0}")]
    Depths(#[from] QueueDepthsError),
}

/// Serialize `depths`' non-zero bins into a QLAM frame tagged with `seq`.
/// Silently caps at [`MAX_ENTRIES`] (the wire count field is one byte) —
/// the component design does not specify priority among bins beyond
/// ascending order, which [`QueueDepths::iter_nonzero`] already provides.
pub fn encode_frame(depths: &QueueDepths, seq: u16) -> Vec<u8> {
    let mut entries = depths.iter_nonzero();
    if entries.len() > MAX_ENTRIES {
        warn!(total = entries.len(), cap = MAX_ENTRIES, "QLAM frame truncated to fit one-byte count");
        entries.truncate(MAX_ENTRIES);
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + entries.len() * ENTRY_LEN);
    buf.push(QLAM_TYPE_TAG);
    let mut seq_bytes = [0u8; 2];
    BigEndian::write_u16(&mut seq_bytes, seq);
    buf.extend_from_slice(&seq_bytes);
    buf.push(entries.len() as u8);

    for (bin, depth) in entries {
        buf.push(bin.0);
        let mut total_bytes = [0u8; 4];
        BigEndian::write_u32(&mut total_bytes, depth.total_bytes);
        buf.extend_from_slice(&total_bytes);
        let ls = depth.ls_bytes.min(LS_BYTES_MAX);
        buf.push((ls >> 16) as u8);
        buf.push((ls >> 8) as u8);
        buf.push(ls as u8);
    }
    buf
}

/// Parse a QLAM frame, returning its sequence number and the (bin, depth)
/// pairs it carries. Does not consult or mutate any [`SeqTracker`] — callers
/// that care about staleness go through [`NeighborQlam::apply`].
pub fn decode_frame(bytes: &[u8]) -> Result<(u16, Vec<(BinIndex, BinDepth)>), CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TooShort { len: bytes.len(), need: HEADER_LEN });
    }
    if bytes[0] != QLAM_TYPE_TAG {
        return Err(CodecError::WrongTypeTag(bytes[0]));
    }
    let seq = BigEndian::read_u16(&bytes[1..3]);
    let count = bytes[3] as usize;
    let need = HEADER_LEN + count * ENTRY_LEN;
    if bytes.len() < need {
        return Err(CodecError::TruncatedEntries { declared: count, actual: bytes.len() - HEADER_LEN });
    }

    let mut entries = Vec::with_capacity(count);
    let mut off = HEADER_LEN;
    for _ in 0..count {
        let bin = BinIndex(bytes[off]);
        let total_bytes = BigEndian::read_u32(&bytes[off + 1..off + 5]);
        let ls_bytes = ((bytes[off + 5] as u32) << 16) | ((bytes[off + 6] as u32) << 8) | (bytes[off + 7] as u32);
        entries.push((bin, BinDepth { total_bytes, ls_bytes }));
        off += ENTRY_LEN;
    }
    Ok((seq, entries))
}

/// Per-neighbor decode state: pairs a [`SeqTracker`] with the apply step, so
/// a stale or malformed frame is discarded without ever reaching
/// [`QueueDepths::set`].
#[derive(Debug, Default)]
pub struct NeighborQlam {
    seq: SeqTracker,
}

impl NeighborQlam {
    pub fn new() -> Self {
        NeighborQlam { seq: SeqTracker::new() }
    }

    /// Decode `bytes` and, if fresh, write its entries into `target`.
    /// Returns `Ok(true)` if applied, `Ok(false)` if discarded as stale
    /// (no mutation), and `Err` on a malformed frame — which per §7 is also
    /// non-fatal: the caller drops the frame and keeps the neighbor's
    /// previous depths.
    pub fn apply(&mut self, bytes: &[u8], target: &QueueDepths) -> Result<bool, CodecError> {
        let (seq, entries) = decode_frame(bytes)?;
        if self.seq.is_stale(seq) {
            return Ok(false);
        }
        for (bin, depth) in entries {
            target.set(bin, depth.total_bytes, depth.ls_bytes)?;
        }
        self.seq.accept(seq);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_qlam_round_trip() {
        let depths = QueueDepths::local();
        depths.set(BinIndex(3), 1234, 200).unwrap();
        depths.set(BinIndex(9), 999_999, 999_999).unwrap();
        // bin 5 stays at zero and must be absent from the wire frame.

        let frame = encode_frame(&depths, 7);
        let (seq, entries) = decode_frame(&frame).unwrap();
        assert_eq!(seq, 7);
        assert_eq!(entries.len(), 2);

        let target = QueueDepths::local();
        for (bin, depth) in &entries {
            target.set(*bin, depth.total_bytes, depth.ls_bytes).unwrap();
        }
        assert_eq!(target.get(BinIndex(3)).unwrap().total_bytes, 1234);
        assert_eq!(target.get(BinIndex(3)).unwrap().ls_bytes, 200);
        assert_eq!(target.get(BinIndex(9)).unwrap().total_bytes, 999_999);
        assert_eq!(target.get(BinIndex(5)).unwrap().total_bytes, 0);
    }

    #[test]
    fn replay_of_same_seq_is_a_no_op() {
        let depths = QueueDepths::local();
        depths.set(BinIndex(3), 1234, 200).unwrap();
        let frame = encode_frame(&depths, 7);

        let target = QueueDepths::local();
        let mut nbr = NeighborQlam::new();
        assert!(nbr.apply(&frame, &target).unwrap());
        target.set(BinIndex(3), 0, 0).unwrap();
        // Replaying the same seq must not re-apply the (now stale) frame.
        assert!(!nbr.apply(&frame, &target).unwrap());
        assert_eq!(target.get(BinIndex(3)).unwrap().total_bytes, 0);
    }

    #[test]
    fn decode_rejects_wrong_type_tag() {
        let bad = vec![0xFF, 0, 0, 0];
        let err = decode_frame(&bad).unwrap_err();
        assert!(matches!(err, CodecError::WrongTypeTag(0xFF)));
    }

    #[test]
    fn decode_rejects_truncated_entries() {
        let mut bytes = vec![QLAM_TYPE_TAG, 0, 0, 2];
        bytes.extend_from_slice(&[0u8; ENTRY_LEN]); // only one of two entries present
        let err = decode_frame(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedEntries { .. }));
    }

    #[test]
    fn decode_rejects_too_short_header() {
        let err = decode_frame(&[QLAM_TYPE_TAG, 0]).unwrap_err();
        assert!(matches!(err, CodecError::TooShort { .. }));
    }

    #[test]
    fn malformed_frame_does_not_mutate_target() {
        let target = QueueDepths::local();
        target.set(BinIndex(1), 500, 0).unwrap();
        let mut nbr = NeighborQlam::new();
        let bad = vec![0xFF, 0, 0, 0];
        assert!(nbr.apply(&bad, &target).is_err());
        assert_eq!(target.get(BinIndex(1)).unwrap().total_bytes, 500);
    }
}
