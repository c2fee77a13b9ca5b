//! A minimal in-memory [`BinMap`](crate::traits::BinMap), sufficient for the
//! UDP reference transport and for tests. A deployment with a real
//! multicast-group or topic directory behind it would swap this out without
//! touching the scheduler, per the trait's opacity contract (§3).

use bpf_types::BinIndex;
use dashmap::DashMap;

use crate::traits::{BinMap, NeighborId};

#[derive(Debug, Default)]
pub struct InMemoryBinMap {
    bindings: DashMap<u8, NeighborId>,
}

impl InMemoryBinMap {
    pub fn new() -> Self {
        InMemoryBinMap { bindings: DashMap::new() }
    }
}

impl BinMap for InMemoryBinMap {
    fn resolve(&self, bin: BinIndex) -> Option<NeighborId> {
        self.bindings.get(&bin.0).map(|entry| *entry)
    }

    fn bind(&self, bin: BinIndex, neighbor: NeighborId) {
        self.bindings.insert(bin.0, neighbor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_replaces_the_previous_neighbor() {
        let map = InMemoryBinMap::new();
        map.bind(BinIndex(1), NeighborId(10));
        map.bind(BinIndex(1), NeighborId(11));
        assert_eq!(map.resolve(BinIndex(1)), Some(NeighborId(11)));
    }

    #[test]
    fn unknown_bin_resolves_to_none() {
        let map = InMemoryBinMap::new();
        assert_eq!(map.resolve(BinIndex(99)), None);
    }
}
