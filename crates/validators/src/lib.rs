//! Structural invariant checks for MINHTON topology snapshots.
//!
//! Every check is a pure function of a [`Snapshot`](minhton_oracle_log::Snapshot)
//! and returns a [`CheckOutcome`]. A violated invariant is never an error:
//! it comes back as `valid = false` with counter-examples, and the caller
//! decides what to do with it.
//!
//! - [`validate_parent_child`]: bidirectionality, child count (advisory),
//!   child and parent position legality
//! - [`validate_adjacency`]: bidirectionality, left/right location, boundary
//! - [`validate_routing_table`]: neighbor and neighbor-child positions,
//!   bidirectionality, completeness
//! - [`validate_tree_structure`] and [`validate_height_balance`]: balance
//!   of the occupied positions

mod adjacency;
mod balance;
mod outcome;
mod parent_child;
mod routing_table;

pub use adjacency::validate_adjacency;
pub use balance::{
    level_counts, null_balance, perfect_balance, validate_height_balance,
    validate_tree_structure,
};
pub use outcome::{CheckKind, CheckOutcome, CounterExample, Severity};
pub use parent_child::validate_parent_child;
pub use routing_table::validate_routing_table;

use minhton_oracle_log::Snapshot;

/// Parent/child, adjacency and routing-table checks, in that order.
pub fn validate_relationships(snapshot: &Snapshot) -> Vec<CheckOutcome> {
    let mut outcomes = validate_parent_child(snapshot);
    outcomes.extend(validate_adjacency(snapshot));
    outcomes.extend(validate_routing_table(snapshot));
    outcomes
}

#[cfg(test)]
pub(crate) mod testing {
    use minhton_oracle_types::{Fanout, Node, PeerAddress, PositionMapper, TreePosition};

    /// Builds nodes with a deterministic address per position.
    pub struct Nodes {
        mapper: PositionMapper,
    }

    impl Nodes {
        pub fn new(fanout: Fanout) -> Self {
            Self {
                mapper: PositionMapper::with_default_scale(fanout).unwrap(),
            }
        }

        pub fn fanout(&self) -> Fanout {
            self.mapper.fanout()
        }

        pub fn at(&mut self, level: u32, number: u64) -> Node {
            let peer = PeerAddress::new(format!("10.0.{}.{}", level, number), 2000);
            Node::new(TreePosition::new(level, number), Some(peer), &mut self.mapper)
        }

        /// A second peer claiming the same position as [`Nodes::at`].
        pub fn peer_at(&mut self, level: u32, number: u64, host: &str) -> Node {
            let peer = PeerAddress::new(host, 2000);
            Node::new(TreePosition::new(level, number), Some(peer), &mut self.mapper)
        }

        pub fn placeholder(&mut self, level: u32, number: u64) -> Node {
            Node::new(TreePosition::new(level, number), None, &mut self.mapper)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Nodes;
    use indexmap::{IndexMap, IndexSet};
    use minhton_oracle_log::EventRef;
    use tracing_test::traced_test;

    fn bare_snapshot(existing: IndexSet<minhton_oracle_types::Node>) -> Snapshot {
        Snapshot {
            event: EventRef::Id(1),
            fanout: 2,
            max_level: existing.iter().map(|node| node.level()).max(),
            existing,
            parent_of: IndexMap::new(),
            children_of: IndexMap::new(),
            adjacent_left_of: IndexMap::new(),
            adjacent_right_of: IndexMap::new(),
            routing_neighbors_of: IndexMap::new(),
            routing_neighbor_children_of: IndexMap::new(),
        }
    }

    #[test]
    fn test_root_only_network_passes_everything() {
        let mut nodes = Nodes::new(2);
        let snapshot = bare_snapshot([nodes.at(0, 0)].into_iter().collect());

        let outcomes = validate_relationships(&snapshot);
        assert_eq!(outcomes.len(), 11);
        assert!(outcomes.iter().all(|outcome| outcome.valid));
        assert!(validate_tree_structure(&snapshot).valid);
        assert!(validate_height_balance(&snapshot).valid);
    }

    #[traced_test]
    #[test]
    fn test_routing_table_without_neighbor_children() {
        let mut nodes = Nodes::new(2);
        let (a, b) = (nodes.at(1, 0), nodes.at(1, 1));
        let mut snapshot = bare_snapshot([nodes.at(0, 0), a.clone(), b.clone()].into_iter().collect());
        snapshot
            .routing_neighbors_of
            .insert(a.clone(), vec![b.clone()]);
        snapshot.routing_neighbors_of.insert(b, vec![a]);

        let outcomes = validate_routing_table(&snapshot);
        assert!(outcomes.iter().all(|outcome| outcome.valid));
        assert!(logs_contain("No routing-table neighbor children recorded"));
    }
}
