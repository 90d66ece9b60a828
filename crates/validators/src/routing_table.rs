//! Routing-table checks.
//!
//! A node `(l, n)` links to the nodes on its level at distance `d * f^i`
//! (`d in 1..f`), and additionally knows the children of those neighbors.

use crate::{CheckKind, CheckOutcome, CounterExample};
use indexmap::IndexMap;
use minhton_oracle_log::Snapshot;
use minhton_oracle_types::{tree, Node};
use tracing::debug;

/// Run the four routing-table checks on a snapshot.
///
/// Without routing-table neighbors all four hold vacuously. The neighbor
/// child checks also hold vacuously without neighbor child data, and the
/// completeness check without child data.
pub fn validate_routing_table(snapshot: &Snapshot) -> Vec<CheckOutcome> {
    let neighbors_of = &snapshot.routing_neighbors_of;
    let neighbor_children_of = &snapshot.routing_neighbor_children_of;

    if neighbors_of.is_empty() {
        return vec![
            CheckOutcome::passed(CheckKind::RoutingNeighborPositions),
            CheckOutcome::passed(CheckKind::RoutingNeighborBidirectional),
            CheckOutcome::passed(CheckKind::RoutingNeighborChildPositions),
            CheckOutcome::passed(CheckKind::RoutingNeighborChildCompleteness),
        ];
    }

    let mut outcomes = vec![
        neighbor_positions(neighbors_of),
        bidirectionality(neighbors_of),
    ];

    if neighbor_children_of.is_empty() {
        debug!(event = %snapshot.event, "No routing-table neighbor children recorded");
        outcomes.push(CheckOutcome::passed(CheckKind::RoutingNeighborChildPositions));
        outcomes.push(CheckOutcome::passed(CheckKind::RoutingNeighborChildCompleteness));
        return outcomes;
    }

    outcomes.push(neighbor_child_positions(neighbor_children_of));
    if snapshot.children_of.is_empty() {
        outcomes.push(CheckOutcome::passed(CheckKind::RoutingNeighborChildCompleteness));
    } else {
        outcomes.push(completeness(
            neighbors_of,
            neighbor_children_of,
            &snapshot.children_of,
        ));
    }
    outcomes
}

/// Every neighbor of `(l, n)` is on level `l` at a legal distance.
pub fn neighbor_positions(neighbors_of: &IndexMap<Node, Vec<Node>>) -> CheckOutcome {
    let mut violations = Vec::new();
    for (node, neighbors) in neighbors_of {
        let legal = tree::routing_table_numbers(node.position(), node.fanout());
        for neighbor in neighbors {
            if neighbor.level() != node.level() || !legal.contains(&neighbor.number()) {
                violations.push(CounterExample::Pair(node.clone(), neighbor.clone()));
            }
        }
    }
    CheckOutcome::from_violations(CheckKind::RoutingNeighborPositions, violations)
}

/// Every neighbor child of `(l, n)` is on level `l+1` in a child slot of a
/// legal neighbor position.
pub fn neighbor_child_positions(neighbor_children_of: &IndexMap<Node, Vec<Node>>) -> CheckOutcome {
    let mut violations = Vec::new();
    for (node, neighbor_children) in neighbor_children_of {
        let legal = tree::routing_table_child_numbers(node.position(), node.fanout());
        for child in neighbor_children {
            if child.level() != node.level() + 1 || !legal.contains(&child.number()) {
                violations.push(CounterExample::Pair(node.clone(), child.clone()));
            }
        }
    }
    CheckOutcome::from_violations(CheckKind::RoutingNeighborChildPositions, violations)
}

/// `b` among the neighbors of `a` requires `a` among the neighbors of `b`.
pub fn bidirectionality(neighbors_of: &IndexMap<Node, Vec<Node>>) -> CheckOutcome {
    let mut violations = Vec::new();
    for (a, neighbors) in neighbors_of {
        for b in neighbors {
            let symmetric = neighbors_of
                .get(b)
                .is_some_and(|neighbors_of_b| neighbors_of_b.contains(a));
            if !symmetric {
                violations.push(CounterExample::Pair(a.clone(), b.clone()));
            }
        }
    }
    CheckOutcome::from_violations(CheckKind::RoutingNeighborBidirectional, violations)
}

/// Every child of every neighbor of `a` is a known neighbor child of `a`.
///
/// Violations are (a, missing child).
pub fn completeness(
    neighbors_of: &IndexMap<Node, Vec<Node>>,
    neighbor_children_of: &IndexMap<Node, Vec<Node>>,
    children_of: &IndexMap<Node, Vec<Node>>,
) -> CheckOutcome {
    let mut violations = Vec::new();
    for (a, neighbors) in neighbors_of {
        let known = neighbor_children_of.get(a).map(Vec::as_slice).unwrap_or(&[]);
        for b in neighbors {
            let Some(children_of_b) = children_of.get(b) else {
                continue;
            };
            for child in children_of_b {
                if !known.contains(child) {
                    violations.push(CounterExample::Pair(a.clone(), child.clone()));
                }
            }
        }
    }
    CheckOutcome::from_violations(CheckKind::RoutingNeighborChildCompleteness, violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Nodes;
    use minhton_oracle_types::TreePosition;

    /// Routing tables of every node of a perfect tree, derived from the
    /// neighbor arithmetic.
    fn perfect_tables(
        nodes: &mut Nodes,
        height: u32,
    ) -> (
        IndexMap<Node, Vec<Node>>,
        IndexMap<Node, Vec<Node>>,
        IndexMap<Node, Vec<Node>>,
    ) {
        let fanout = nodes.fanout();
        let mut neighbors_of = IndexMap::new();
        let mut neighbor_children_of = IndexMap::new();
        let mut children_of = IndexMap::new();

        for position in tree::perfect_tree_positions(fanout, height) {
            let node = nodes.at(position.level, position.number);
            let neighbors: Vec<Node> = tree::routing_table_numbers(position, fanout)
                .into_iter()
                .map(|n| nodes.at(position.level, n))
                .collect();
            if !neighbors.is_empty() {
                neighbors_of.insert(node.clone(), neighbors);
            }
            if position.level < height {
                let neighbor_children: Vec<Node> = tree::routing_table_child_numbers(position, fanout)
                    .into_iter()
                    .map(|n| nodes.at(position.level + 1, n))
                    .collect();
                if !neighbor_children.is_empty() {
                    neighbor_children_of.insert(node.clone(), neighbor_children);
                }
                let children: Vec<Node> = tree::child_numbers(position, fanout)
                    .map(|n| nodes.at(position.level + 1, n))
                    .collect();
                children_of.insert(node, children);
            }
        }
        (neighbors_of, neighbor_children_of, children_of)
    }

    #[test]
    fn test_perfect_tree_tables_are_valid() {
        for fanout in 2..=3u16 {
            let mut nodes = Nodes::new(fanout);
            let (neighbors_of, neighbor_children_of, children_of) = perfect_tables(&mut nodes, 3);

            assert!(neighbor_positions(&neighbors_of).valid);
            assert!(bidirectionality(&neighbors_of).valid);
            assert!(neighbor_child_positions(&neighbor_children_of).valid);
            assert!(completeness(&neighbors_of, &neighbor_children_of, &children_of).valid);
        }
    }

    #[test]
    fn test_illegal_neighbor_position() {
        let mut nodes = Nodes::new(2);
        let node = nodes.at(3, 0);
        // 3:3 is at distance 3, which is not a power of two.
        let wrong = nodes.at(3, 3);
        let neighbors_of: IndexMap<_, _> =
            [(node.clone(), vec![nodes.at(3, 1), wrong.clone()])].into_iter().collect();

        let outcome = neighbor_positions(&neighbors_of);
        assert_eq!(outcome.counter_examples, vec![CounterExample::Pair(node, wrong)]);
    }

    #[test]
    fn test_neighbor_on_other_level() {
        let mut nodes = Nodes::new(2);
        let node = nodes.at(2, 0);
        let other_level = nodes.at(1, 1);
        let neighbors_of: IndexMap<_, _> = [(node, vec![other_level])].into_iter().collect();
        assert!(!neighbor_positions(&neighbors_of).valid);
    }

    #[test]
    fn test_one_sided_neighbor() {
        let mut nodes = Nodes::new(2);
        let a = nodes.at(2, 0);
        let b = nodes.at(2, 1);
        let neighbors_of: IndexMap<_, _> = [(a.clone(), vec![b.clone()])].into_iter().collect();

        let outcome = bidirectionality(&neighbors_of);
        assert_eq!(outcome.counter_examples, vec![CounterExample::Pair(a, b)]);
    }

    #[test]
    fn test_neighbor_child_positions() {
        let mut nodes = Nodes::new(2);
        let node = nodes.at(1, 0);
        // Legal neighbor children of 1:0 are the children of 1:1: 2:2 and 2:3.
        let legal = nodes.at(2, 3);
        let own_child = nodes.at(2, 0);
        let neighbor_children_of: IndexMap<_, _> =
            [(node.clone(), vec![legal, own_child.clone()])].into_iter().collect();

        let outcome = neighbor_child_positions(&neighbor_children_of);
        assert_eq!(outcome.counter_examples, vec![CounterExample::Pair(node, own_child)]);
    }

    #[test]
    fn test_incomplete_neighbor_children() {
        let mut nodes = Nodes::new(2);
        let (neighbors_of, mut neighbor_children_of, children_of) = perfect_tables(&mut nodes, 2);

        let node = nodes.at(1, 0);
        let forgotten = nodes.at(2, 3);
        neighbor_children_of
            .get_mut(&node)
            .unwrap()
            .retain(|child| child.position() != TreePosition::new(2, 3));

        let outcome = completeness(&neighbors_of, &neighbor_children_of, &children_of);
        assert_eq!(outcome.counter_examples, vec![CounterExample::Pair(node, forgotten)]);
    }
}
