//! Adjacency checks.
//!
//! The adjacent left of a node is its in-order predecessor by horizontal
//! position value, the adjacent right its successor.

use crate::{CheckKind, CheckOutcome, CounterExample};
use indexmap::{IndexMap, IndexSet};
use minhton_oracle_log::Snapshot;
use minhton_oracle_types::Node;

/// Run the three adjacency checks on a snapshot.
///
/// Without any adjacency relationship all three hold vacuously.
pub fn validate_adjacency(snapshot: &Snapshot) -> Vec<CheckOutcome> {
    let left_of = &snapshot.adjacent_left_of;
    let right_of = &snapshot.adjacent_right_of;
    if left_of.is_empty() && right_of.is_empty() {
        return vec![
            CheckOutcome::passed(CheckKind::AdjacentBidirectional),
            CheckOutcome::passed(CheckKind::AdjacentLocations),
            CheckOutcome::passed(CheckKind::AdjacentBoundary),
        ];
    }

    vec![
        bidirectionality(left_of, right_of),
        locations(left_of, right_of),
        boundary(left_of, right_of, &snapshot.existing),
    ]
}

/// `left_of[a] = b` requires `right_of[b] = a`.
///
/// A missing reverse entry is reported as (a, b), a conflicting one as
/// (a, b, right_of[b]). Placeholders on either side are not checked.
pub fn bidirectionality(
    left_of: &IndexMap<Node, Node>,
    right_of: &IndexMap<Node, Node>,
) -> CheckOutcome {
    let mut violations = Vec::new();
    for (a, b) in left_of {
        if b.is_placeholder() {
            continue;
        }
        match right_of.get(b) {
            None => violations.push(CounterExample::Pair(a.clone(), b.clone())),
            Some(c) if !c.is_placeholder() && c != a => {
                violations.push(CounterExample::Triple(a.clone(), b.clone(), c.clone()))
            }
            Some(_) => {}
        }
    }
    CheckOutcome::from_violations(CheckKind::AdjacentBidirectional, violations)
}

/// Adjacent left is strictly left of the node, adjacent right strictly
/// right of it.
pub fn locations(left_of: &IndexMap<Node, Node>, right_of: &IndexMap<Node, Node>) -> CheckOutcome {
    let nodes: IndexSet<&Node> = left_of.keys().chain(right_of.keys()).collect();

    let mut violations = Vec::new();
    for node in nodes {
        let left = left_of.get(node);
        let right = right_of.get(node);

        let left_ok = left.map_or(true, |l| l.is_placeholder() || l.is_left_of(node));
        let right_ok = right.map_or(true, |r| r.is_placeholder() || r.is_right_of(node));
        if !(left_ok && right_ok) {
            violations.push(CounterExample::Adjacents {
                node: node.clone(),
                left: left.cloned(),
                right: right.cloned(),
            });
        }
    }
    CheckOutcome::from_violations(CheckKind::AdjacentLocations, violations)
}

/// Exactly the leftmost existing node lacks an adjacent left and exactly
/// the rightmost lacks an adjacent right.
///
/// Only entries of existing nodes count, so for `N` nodes this is
/// `|left_of| = |right_of| = N - 1` with `N - 2` nodes in both.
pub fn boundary(
    left_of: &IndexMap<Node, Node>,
    right_of: &IndexMap<Node, Node>,
    existing: &IndexSet<Node>,
) -> CheckOutcome {
    let (Some(leftmost), Some(rightmost)) = (
        existing.iter().min_by_key(|n| n.value()),
        existing.iter().max_by_key(|n| n.value()),
    ) else {
        return CheckOutcome::passed(CheckKind::AdjacentBoundary);
    };

    let mut violations = Vec::new();
    for node in existing {
        let left = left_of.get(node);
        let right = right_of.get(node);
        let left_ok = left.is_some() != (node == leftmost);
        let right_ok = right.is_some() != (node == rightmost);
        if !(left_ok && right_ok) {
            violations.push(CounterExample::Adjacents {
                node: node.clone(),
                left: left.cloned(),
                right: right.cloned(),
            });
        }
    }
    CheckOutcome::from_violations(CheckKind::AdjacentBoundary, violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Nodes;

    /// In-order chain for a full fanout-2 tree of height 1: 1:0, 0:0, 1:1.
    fn chain(nodes: &mut Nodes) -> (IndexMap<Node, Node>, IndexMap<Node, Node>, IndexSet<Node>) {
        let (a, root, b) = (nodes.at(1, 0), nodes.at(0, 0), nodes.at(1, 1));
        let left_of = [(root.clone(), a.clone()), (b.clone(), root.clone())]
            .into_iter()
            .collect();
        let right_of = [(a.clone(), root.clone()), (root.clone(), b.clone())]
            .into_iter()
            .collect();
        let existing = [a, root, b].into_iter().collect();
        (left_of, right_of, existing)
    }

    #[test]
    fn test_consistent_chain_is_valid() {
        let mut nodes = Nodes::new(2);
        let (left_of, right_of, existing) = chain(&mut nodes);

        assert!(bidirectionality(&left_of, &right_of).valid);
        assert!(locations(&left_of, &right_of).valid);
        assert!(boundary(&left_of, &right_of, &existing).valid);
    }

    #[test]
    fn test_missing_reverse_entry() {
        let mut nodes = Nodes::new(2);
        let a = nodes.at(1, 1);
        let b = nodes.at(1, 0);
        let left_of: IndexMap<_, _> = [(a.clone(), b.clone())].into_iter().collect();

        let outcome = bidirectionality(&left_of, &IndexMap::new());
        assert!(outcome.is_failure());
        assert_eq!(outcome.counter_examples, vec![CounterExample::Pair(a, b)]);
    }

    #[test]
    fn test_conflicting_reverse_entry() {
        let mut nodes = Nodes::new(2);
        let (mut left_of, right_of, _) = chain(&mut nodes);
        let root = nodes.at(0, 0);
        let stranger = nodes.at(2, 3);
        // 2:3 claims 0:0 as its left, but 0:0 points right at 1:1.
        left_of.insert(stranger.clone(), root.clone());

        let outcome = bidirectionality(&left_of, &right_of);
        assert_eq!(
            outcome.counter_examples,
            vec![CounterExample::Triple(stranger, root, nodes.at(1, 1))]
        );
    }

    #[test]
    fn test_placeholder_neighbors_are_skipped() {
        let mut nodes = Nodes::new(2);
        let a = nodes.at(1, 1);
        let left_of: IndexMap<_, _> = [(a, nodes.placeholder(0, 0))].into_iter().collect();
        assert!(bidirectionality(&left_of, &IndexMap::new()).valid);
        assert!(locations(&left_of, &IndexMap::new()).valid);
    }

    #[test]
    fn test_wrong_side() {
        let mut nodes = Nodes::new(2);
        let root = nodes.at(0, 0);
        let right_child = nodes.at(1, 1);
        let left_of: IndexMap<_, _> = [(root.clone(), right_child.clone())].into_iter().collect();

        let outcome = locations(&left_of, &IndexMap::new());
        assert_eq!(
            outcome.counter_examples,
            vec![CounterExample::Adjacents {
                node: root,
                left: Some(right_child),
                right: None,
            }]
        );
    }

    #[test]
    fn test_boundary_violations() {
        let mut nodes = Nodes::new(2);
        let (mut left_of, right_of, existing) = chain(&mut nodes);

        // Leftmost node 1:0 must not have an adjacent left.
        left_of.insert(nodes.at(1, 0), nodes.at(2, 0));
        let outcome = boundary(&left_of, &right_of, &existing);
        assert_eq!(outcome.counter_examples.len(), 1);

        // The middle node lost its adjacent left.
        let (mut left_of, right_of, existing) = chain(&mut nodes);
        left_of.shift_remove(&nodes.at(0, 0));
        assert!(!boundary(&left_of, &right_of, &existing).valid);
    }

    #[test]
    fn test_single_node_boundary() {
        let mut nodes = Nodes::new(2);
        let existing: IndexSet<_> = [nodes.at(0, 0)].into_iter().collect();
        assert!(boundary(&IndexMap::new(), &IndexMap::new(), &existing).valid);
    }
}
