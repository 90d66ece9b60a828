//! Tree balance checks over the existing nodes.
//!
//! These only look at which positions are occupied, not at any recorded
//! relationship.

use crate::{CheckKind, CheckOutcome, CounterExample};
use indexmap::IndexSet;
use minhton_oracle_log::Snapshot;
use minhton_oracle_types::{tree, Fanout, Node, TreePosition};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Null balance, or perfect balance when the network has exactly the size
/// of a perfect tree reaching the deepest level.
pub fn validate_tree_structure(snapshot: &Snapshot) -> CheckOutcome {
    let Some(max_level) = snapshot.max_level else {
        return CheckOutcome::passed(CheckKind::NullBalance);
    };
    let counts = level_counts(&snapshot.existing);

    let perfect_size = tree::nodes_in_perfect_tree(snapshot.fanout, max_level);
    if perfect_size == Some(snapshot.network_size() as u64) {
        debug!(event = %snapshot.event, max_level, "Network has perfect size");
        perfect_balance(snapshot.fanout, &counts, max_level)
    } else {
        null_balance(snapshot.fanout, &counts, max_level)
    }
}

/// Number of nodes per level.
pub fn level_counts(nodes: &IndexSet<Node>) -> BTreeMap<u32, u64> {
    let mut counts = BTreeMap::new();
    for node in nodes {
        *counts.entry(node.level()).or_insert(0) += 1;
    }
    counts
}

/// Every level above `max_level` holds `f^l` nodes and `max_level` holds
/// no more than that.
pub fn null_balance(fanout: Fanout, counts: &BTreeMap<u32, u64>, max_level: u32) -> CheckOutcome {
    let mut violations: Vec<CounterExample> = (0..max_level)
        .filter_map(|level| level_violation(fanout, counts, level))
        .collect();
    let deepest = counts.get(&max_level).copied().unwrap_or(0);
    if let Some(expected) = tree::nodes_on_level(fanout, max_level) {
        if deepest > expected {
            violations.push(CounterExample::Level {
                level: max_level,
                expected,
                actual: deepest,
            });
        }
    }
    CheckOutcome::from_violations(CheckKind::NullBalance, violations)
}

/// Every level up to and including `max_level` holds `f^l` nodes.
pub fn perfect_balance(
    fanout: Fanout,
    counts: &BTreeMap<u32, u64>,
    max_level: u32,
) -> CheckOutcome {
    let violations = (0..=max_level)
        .filter_map(|level| level_violation(fanout, counts, level))
        .collect();
    CheckOutcome::from_violations(CheckKind::PerfectBalance, violations)
}

fn level_violation(fanout: Fanout, counts: &BTreeMap<u32, u64>, level: u32) -> Option<CounterExample> {
    let actual = counts.get(&level).copied().unwrap_or(0);
    // A level wider than u64 can never be full.
    let expected = tree::nodes_on_level(fanout, level).unwrap_or(u64::MAX);
    (actual != expected).then_some(CounterExample::Level {
        level,
        expected,
        actual,
    })
}

/// Height balance of the existing nodes arranged as a tree.
///
/// Empty child slots have height 0 and a node without children height 1.
/// At every node the heights of its `f` child slots differ by at most one.
/// Nodes whose parent position is unoccupied cannot be placed and fail
/// the check, as does every pair of nodes sharing one position.
pub fn validate_height_balance(snapshot: &Snapshot) -> CheckOutcome {
    if snapshot.existing.is_empty() {
        return CheckOutcome::passed(CheckKind::HeightBalance);
    }
    let arena = Arena::build(snapshot.fanout, &snapshot.existing);

    let mut violations: Vec<CounterExample> = arena
        .duplicates
        .iter()
        .map(|(kept, other)| CounterExample::Pair((*kept).clone(), (*other).clone()))
        .collect();
    violations.extend(
        arena
            .orphans
            .iter()
            .map(|node| CounterExample::Node((*node).clone())),
    );
    if !arena.nodes.contains_key(&TreePosition::ROOT) {
        violations.push(CounterExample::Note("root position 0:0 is not occupied".into()));
    }

    let heights = arena.heights();
    for (position, node) in &arena.nodes {
        let slots = tree::child_numbers(*position, snapshot.fanout)
            .map(|number| heights.get(&TreePosition::new(position.level + 1, number)));
        let (min, max) = slots.fold((u32::MAX, 0), |(min, max), height| {
            let height = height.copied().unwrap_or(0);
            (min.min(height), max.max(height))
        });
        if max - min > 1 {
            violations.push(CounterExample::Node((*node).clone()));
        }
    }
    CheckOutcome::from_violations(CheckKind::HeightBalance, violations)
}

/// Existing nodes that hang off the root through occupied parents.
struct Arena<'a> {
    fanout: Fanout,
    nodes: BTreeMap<TreePosition, &'a Node>,
    orphans: Vec<&'a Node>,
    /// Nodes at an already occupied position, with the first occupant.
    duplicates: Vec<(&'a Node, &'a Node)>,
}

impl<'a> Arena<'a> {
    fn build(fanout: Fanout, existing: &'a IndexSet<Node>) -> Self {
        let mut occupied: HashMap<TreePosition, &Node> = HashMap::with_capacity(existing.len());
        let mut duplicates = Vec::new();
        for node in existing {
            match occupied.entry(node.position()) {
                Entry::Occupied(first) => duplicates.push((*first.get(), node)),
                Entry::Vacant(slot) => {
                    slot.insert(node);
                }
            }
        }

        let mut by_level: Vec<&Node> = occupied.values().copied().collect();
        by_level.sort_by_key(|node| node.position());

        let mut nodes = BTreeMap::new();
        let mut orphans = Vec::new();
        for node in by_level {
            let attached = match node.position().parent(fanout) {
                None => true,
                Some(parent) => nodes.contains_key(&parent),
            };
            if attached {
                nodes.insert(node.position(), node);
            } else {
                orphans.push(node);
            }
        }
        Self {
            fanout,
            nodes,
            orphans,
            duplicates,
        }
    }

    /// Subtree height per placed position.
    fn heights(&self) -> HashMap<TreePosition, u32> {
        let mut heights: HashMap<TreePosition, u32> = HashMap::with_capacity(self.nodes.len());
        // Deepest positions first, so children are done before parents.
        for position in self.nodes.keys().rev() {
            let tallest_child = tree::child_numbers(*position, self.fanout)
                .filter_map(|number| heights.get(&TreePosition::new(position.level + 1, number)))
                .copied()
                .max()
                .unwrap_or(0);
            heights.insert(*position, tallest_child + 1);
        }
        heights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Nodes;
    use minhton_oracle_log::EventRef;

    fn snapshot_of(nodes: &mut Nodes, positions: &[(u32, u64)]) -> Snapshot {
        let existing: IndexSet<Node> = positions
            .iter()
            .map(|&(level, number)| nodes.at(level, number))
            .collect();
        Snapshot {
            event: EventRef::Final,
            fanout: nodes.fanout(),
            max_level: existing.iter().map(Node::level).max(),
            existing,
            parent_of: Default::default(),
            children_of: Default::default(),
            adjacent_left_of: Default::default(),
            adjacent_right_of: Default::default(),
            routing_neighbors_of: Default::default(),
            routing_neighbor_children_of: Default::default(),
        }
    }

    #[test]
    fn test_three_node_tree_is_perfect() {
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (1, 1)]);

        let outcome = validate_tree_structure(&snapshot);
        assert_eq!(outcome.check, CheckKind::PerfectBalance);
        assert!(outcome.valid);
        assert!(validate_height_balance(&snapshot).valid);
    }

    #[test]
    fn test_partial_last_level_is_null_balanced() {
        let mut nodes = Nodes::new(3);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (1, 1), (1, 2), (2, 4)]);

        let outcome = validate_tree_structure(&snapshot);
        assert_eq!(outcome.check, CheckKind::NullBalance);
        assert!(outcome.valid);
    }

    #[test]
    fn test_gap_above_deepest_level() {
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (2, 0)]);

        let outcome = validate_tree_structure(&snapshot);
        assert_eq!(outcome.check, CheckKind::NullBalance);
        assert_eq!(
            outcome.counter_examples,
            vec![CounterExample::Level {
                level: 1,
                expected: 2,
                actual: 1,
            }]
        );
    }

    #[test]
    fn test_perfect_size_with_hole() {
        // Seven nodes with fanout 2 must fill levels 0..=2, but 1:1 is
        // missing and 3:0 takes its place.
        let mut nodes = Nodes::new(2);
        let positions = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (2, 3), (3, 0)];
        let snapshot = snapshot_of(&mut nodes, &positions);

        // Perfect size for height 3 is 15, so null balance applies.
        let outcome = validate_tree_structure(&snapshot);
        assert_eq!(outcome.check, CheckKind::NullBalance);
        assert!(!outcome.valid);

        let counts = level_counts(&snapshot.existing);
        let outcome = perfect_balance(2, &counts, 2);
        assert_eq!(
            outcome.counter_examples,
            vec![CounterExample::Level {
                level: 1,
                expected: 2,
                actual: 1,
            }]
        );
    }

    #[test]
    fn test_single_root_is_balanced() {
        let mut nodes = Nodes::new(4);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0)]);
        assert!(validate_tree_structure(&snapshot).valid);
        assert!(validate_height_balance(&snapshot).valid);
    }

    #[test]
    fn test_empty_network_is_balanced() {
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[]);
        assert!(validate_tree_structure(&snapshot).valid);
        assert!(validate_height_balance(&snapshot).valid);
    }

    #[test]
    fn test_leaf_depth_difference_breaks_height_balance() {
        // Left subtree reaches level 2, right child slot of the root is empty.
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (2, 0), (2, 1)]);

        let outcome = validate_height_balance(&snapshot);
        assert!(!outcome.valid);
        assert_eq!(outcome.counter_examples, vec![CounterExample::Node(nodes.at(0, 0))]);
    }

    #[test]
    fn test_height_balance_allows_one_level_difference() {
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (2, 2)]);
        assert!(validate_height_balance(&snapshot).valid);

        // Leaves at depth 3, 3 and 2 under the root's children.
        let deep = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (1, 1), (2, 0), (3, 0), (3, 1)]);
        let outcome = validate_height_balance(&deep);
        assert!(!outcome.valid);
    }

    #[test]
    fn test_overfull_deepest_level_breaks_null_balance() {
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0)]);
        let mut existing = snapshot.existing.clone();
        existing.insert(nodes.peer_at(0, 0, "10.9.9.9"));
        let snapshot = Snapshot {
            existing,
            ..snapshot
        };

        let outcome = validate_tree_structure(&snapshot);
        assert_eq!(outcome.check, CheckKind::NullBalance);
        assert_eq!(
            outcome.counter_examples,
            vec![CounterExample::Level {
                level: 0,
                expected: 1,
                actual: 2,
            }]
        );
    }

    #[test]
    fn test_shared_position_fails_height_balance() {
        let mut nodes = Nodes::new(2);
        let mut snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (1, 1)]);
        let second = nodes.peer_at(1, 1, "10.9.9.9");
        snapshot.existing.insert(second.clone());

        let outcome = validate_height_balance(&snapshot);
        assert!(!outcome.valid);
        assert_eq!(
            outcome.counter_examples,
            vec![CounterExample::Pair(nodes.at(1, 1), second)]
        );
        assert!(!validate_tree_structure(&snapshot).valid);
    }

    #[test]
    fn test_orphan_fails_height_balance() {
        let mut nodes = Nodes::new(2);
        let snapshot = snapshot_of(&mut nodes, &[(0, 0), (1, 0), (2, 3)]);

        let outcome = validate_height_balance(&snapshot);
        assert!(outcome
            .counter_examples
            .contains(&CounterExample::Node(nodes.at(2, 3))));
    }
}
