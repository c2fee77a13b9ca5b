//! Which neighbors carry traffic toward which destination bins.
//!
//! Not named by the component design, which treats "path controller" as an
//! already-resolved integer (§4.10's `path_ctrl` field) — this is the
//! lookup that resolves it: a bin may be reachable over more than one
//! neighbor, and the gradient scheduler computes one candidate solution per
//! (destination, neighbor) pair currently registered here.

use std::collections::HashMap;

use bpf_transport::NeighborId;
use bpf_types::BinIndex;

#[derive(Debug, Default)]
pub struct Topology {
    routes: HashMap<u8, Vec<NeighborId>>,
}

impl Topology {
    pub fn new() -> Self {
        Topology { routes: HashMap::new() }
    }

    /// Register `neighbor` as a path controller for `dst`, if not already
    /// present.
    pub fn add_route(&mut self, dst: BinIndex, neighbor: NeighborId) {
        let entry = self.routes.entry(dst.0).or_default();
        if !entry.contains(&neighbor) {
            entry.push(neighbor);
        }
    }

    pub fn remove_route(&mut self, dst: BinIndex, neighbor: NeighborId) {
        if let Some(entry) = self.routes.get_mut(&dst.0) {
            entry.retain(|n| *n != neighbor);
        }
    }

    /// Drop every route through `neighbor`, e.g. when it is declared dead.
    pub fn remove_neighbor(&mut self, neighbor: NeighborId) {
        for entry in self.routes.values_mut() {
            entry.retain(|n| *n != neighbor);
        }
    }

    pub fn neighbors_for(&self, dst: BinIndex) -> &[NeighborId] {
        self.routes.get(&dst.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn destinations(&self) -> impl Iterator<Item = BinIndex> + '_ {
        self.routes.keys().map(|&b| BinIndex(b))
    }

    pub fn all_neighbors(&self) -> Vec<NeighborId> {
        let mut seen = Vec::new();
        for entry in self.routes.values() {
            for n in entry {
                if !seen.contains(n) {
                    seen.push(*n);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_is_retrievable_after_add() {
        let mut topo = Topology::new();
        topo.add_route(BinIndex(3), NeighborId(1));
        topo.add_route(BinIndex(3), NeighborId(2));
        assert_eq!(topo.neighbors_for(BinIndex(3)), &[NeighborId(1), NeighborId(2)]);
    }

    #[test]
    fn duplicate_route_is_not_added_twice() {
        let mut topo = Topology::new();
        topo.add_route(BinIndex(1), NeighborId(9));
        topo.add_route(BinIndex(1), NeighborId(9));
        assert_eq!(topo.neighbors_for(BinIndex(1)).len(), 1);
    }

    #[test]
    fn remove_neighbor_clears_every_route() {
        let mut topo = Topology::new();
        topo.add_route(BinIndex(1), NeighborId(9));
        topo.add_route(BinIndex(2), NeighborId(9));
        topo.remove_neighbor(NeighborId(9));
        assert!(topo.neighbors_for(BinIndex(1)).is_empty());
        assert!(topo.neighbors_for(BinIndex(2)).is_empty());
    }
}
