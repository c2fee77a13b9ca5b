//! Compact destination identifiers handed out by the external BinMap.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, dense destination identifier.
///
/// The BinMap (external to this core) assigns these from three disjoint
/// ranges — unicast destination, interior-node-only, and multicast-group —
/// but the core never needs to distinguish the ranges itself; it only needs
/// cheap iteration over "all destination bins" and cheap equality/hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinIndex(pub u8);

impl BinIndex {
    /// The maximum number of distinct bins the dense storage backends size for.
    pub const MAX_BINS: usize = 256;

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bin#{}", self.0)
    }
}

impl From<u8> for BinIndex {
    fn from(v: u8) -> Self {
        BinIndex(v)
    }
}

impl From<BinIndex> for usize {
    fn from(b: BinIndex) -> Self {
        b.0 as usize
    }
}
