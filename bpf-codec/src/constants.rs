//! Wire-format constants for the QLAM frame.

/// The core's single wire type tag for a QLAM frame. The component design
/// notes the original carries ls_bytes in 24 bits at some call sites and 32
/// at others; this implementation fixes one uniform 24-bit layout for every
/// call site (see crate-level docs).
pub const QLAM_TYPE_TAG: u8 = 0x51; // 'Q'

/// Header: type tag (1) + seq (2) + count (1).
pub const HEADER_LEN: usize = 4;
/// Per-entry: bin_id (1) + total_bytes u32 (4) + ls_bytes u24 (3).
pub const ENTRY_LEN: usize = 6;
/// Pair count is a single byte; a frame can carry at most this many bins.
pub const MAX_ENTRIES: usize = 255;
/// `ls_bytes` is carried in 24 bits on the wire.
pub const LS_BYTES_MAX: u32 = (1 << 24) - 1;

/// Reorder-tolerance window: a sequence number within this many steps
/// *behind* the most recently accepted one is treated as stale.
pub const SEQ_REORDER_WINDOW: u16 = 128;
