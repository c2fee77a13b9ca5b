//! Multicast destination bitvector.

use crate::bin_index::BinIndex;
use serde::{Deserialize, Serialize};

/// A bitvector over bins, used to represent the still-pending destination
/// set of a multicast packet, or the member set of a multicast group.
///
/// Bit `i` of the vector corresponds to `BinIndex(i)`. Unicast traffic is
/// represented as a single set bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DstVec(pub u64);

impl DstVec {
    pub const EMPTY: DstVec = DstVec(0);

    #[inline]
    pub fn single(bin: BinIndex) -> Self {
        DstVec(1u64 << (bin.0 as u64 & 63))
    }

    #[inline]
    pub fn contains(&self, bin: BinIndex) -> bool {
        self.0 & (1u64 << (bin.0 as u64 & 63)) != 0
    }

    #[inline]
    pub fn insert(&mut self, bin: BinIndex) {
        self.0 |= 1u64 << (bin.0 as u64 & 63);
    }

    #[inline]
    pub fn remove(&mut self, bin: BinIndex) {
        self.0 &= !(1u64 << (bin.0 as u64 & 63));
    }

    /// Number of member bins currently set.
    #[inline]
    pub fn population(&self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if every bit set in `self` is also set in `other` — i.e. `self`
    /// is the set of destinations a caller wants to service out of the
    /// packet's full remaining destination set `other`.
    #[inline]
    pub fn is_subset_of(&self, other: &DstVec) -> bool {
        self.0 & other.0 == self.0
    }

    #[inline]
    pub fn union(&self, other: &DstVec) -> DstVec {
        DstVec(self.0 | other.0)
    }

    #[inline]
    pub fn intersection(&self, other: &DstVec) -> DstVec {
        DstVec(self.0 & other.0)
    }

    /// The complement of `other` within `self`: destinations remaining in
    /// `self` once `other` has been serviced.
    #[inline]
    pub fn difference(&self, other: &DstVec) -> DstVec {
        DstVec(self.0 & !other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = BinIndex> + '_ {
        let bits = self.0;
        (0u8..64).filter(move |i| bits & (1u64 << i) != 0).map(BinIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bit_roundtrip() {
        let v = DstVec::single(BinIndex(7));
        assert!(v.contains(BinIndex(7)));
        assert!(!v.contains(BinIndex(8)));
        assert_eq!(v.population(), 1);
    }

    #[test]
    fn subset_and_difference() {
        let mut full = DstVec::EMPTY;
        full.insert(BinIndex(1));
        full.insert(BinIndex(2));
        full.insert(BinIndex(3));

        let subset = DstVec::single(BinIndex(1)).union(&DstVec::single(BinIndex(2)));
        assert!(subset.is_subset_of(&full));

        let remaining = full.difference(&subset);
        assert!(remaining.contains(BinIndex(3)));
        assert!(!remaining.contains(BinIndex(1)));
        assert_eq!(remaining.population(), 1);
    }
}
