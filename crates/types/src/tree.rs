//! Tree arithmetic for a fanout-ary tree.
//!
//! Numbers are left-to-right indices within a level, so a node `(ℓ, n)`
//! has children `(ℓ+1, n·f + k)` for `k in 0..f` and a level holds at most
//! `f^ℓ` nodes.

use crate::{Fanout, TreePosition};
use std::collections::BTreeSet;
use std::ops::Range;

/// Numbers of the `fanout` child slots of `position` on level `ℓ+1`.
pub fn child_numbers(position: TreePosition, fanout: Fanout) -> Range<u64> {
    let f = fanout as u64;
    let first = position.number.saturating_mul(f);
    first..first.saturating_add(f)
}

/// Whether `child` is one of the child slots of `parent`.
pub fn is_child_slot(parent: TreePosition, child: TreePosition, fanout: Fanout) -> bool {
    child.level == parent.level + 1 && child_numbers(parent, fanout).contains(&child.number)
}

/// Width of a level (`f^ℓ`), or None if it exceeds u64.
pub fn nodes_on_level(fanout: Fanout, level: u32) -> Option<u64> {
    (fanout as u64).checked_pow(level)
}

/// Size of a perfect tree of height `height`: `(f^(h+1) - 1) / (f - 1)`.
pub fn nodes_in_perfect_tree(fanout: Fanout, height: u32) -> Option<u64> {
    let f = fanout as u64;
    let next = f.checked_pow(height.checked_add(1)?)?;
    Some((next - 1) / (f - 1))
}

/// Distances `d·f^i` between a node on `level` and its routing-table
/// neighbors, for `d in 1..f`.
///
/// Exponents stop at `level - 1`; any larger distance leaves `[0, f^ℓ)`.
pub fn routing_sequence(fanout: Fanout, level: u32) -> Vec<u64> {
    let f = fanout as u64;
    let mut sequence = Vec::new();
    for i in 0..level {
        let Some(power) = f.checked_pow(i) else {
            break;
        };
        for d in 1..f {
            if let Some(distance) = power.checked_mul(d) {
                sequence.push(distance);
            }
        }
    }
    sequence
}

/// Legal routing-table neighbor numbers of `position`, both sides.
pub fn routing_table_numbers(position: TreePosition, fanout: Fanout) -> BTreeSet<u64> {
    let width = nodes_on_level(fanout, position.level).unwrap_or(u64::MAX);
    let n = position.number;

    let mut numbers = BTreeSet::new();
    for distance in routing_sequence(fanout, position.level) {
        if let Some(left) = n.checked_sub(distance) {
            numbers.insert(left);
        }
        if let Some(right) = n.checked_add(distance) {
            if right < width {
                numbers.insert(right);
            }
        }
    }
    numbers
}

/// Legal numbers (on level `ℓ+1`) of the children of routing-table
/// neighbors of `position`.
pub fn routing_table_child_numbers(position: TreePosition, fanout: Fanout) -> BTreeSet<u64> {
    routing_table_numbers(position, fanout)
        .into_iter()
        .flat_map(|neighbor| child_numbers(TreePosition::new(position.level, neighbor), fanout))
        .collect()
}

/// All positions of a perfect tree of the given height, level by level.
pub fn perfect_tree_positions(fanout: Fanout, height: u32) -> Vec<TreePosition> {
    let mut positions = Vec::new();
    for level in 0..=height {
        let width = nodes_on_level(fanout, level).unwrap_or(0);
        positions.extend((0..width).map(|number| TreePosition::new(level, number)));
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_numbers() {
        assert_eq!(child_numbers(TreePosition::ROOT, 2), 0..2);
        assert_eq!(child_numbers(TreePosition::new(1, 2), 3), 6..9);
        assert!(is_child_slot(
            TreePosition::new(1, 1),
            TreePosition::new(2, 3),
            2
        ));
        assert!(!is_child_slot(
            TreePosition::new(1, 1),
            TreePosition::new(2, 1),
            2
        ));
        assert!(!is_child_slot(
            TreePosition::ROOT,
            TreePosition::new(2, 0),
            2
        ));
    }

    #[test]
    fn test_perfect_tree_sizes() {
        assert_eq!(nodes_in_perfect_tree(2, 0), Some(1));
        assert_eq!(nodes_in_perfect_tree(2, 1), Some(3));
        assert_eq!(nodes_in_perfect_tree(2, 3), Some(15));
        assert_eq!(nodes_in_perfect_tree(3, 2), Some(13));
        assert_eq!(nodes_on_level(4, 3), Some(64));
        assert_eq!(nodes_on_level(2, 64), None);
        assert_eq!(perfect_tree_positions(3, 2).len(), 13);
    }

    #[test]
    fn test_routing_numbers_fanout_two() {
        // Level 3, number 2: distances 1, 2, 4 -> 1, 3, 0, 4, 6.
        let numbers = routing_table_numbers(TreePosition::new(3, 2), 2);
        assert_eq!(numbers.into_iter().collect::<Vec<_>>(), vec![0, 1, 3, 4, 6]);
        assert!(routing_table_numbers(TreePosition::ROOT, 2).is_empty());
    }

    #[test]
    fn test_routing_numbers_fanout_three() {
        // Level 2, number 4: distances 1, 2, 3, 6; 4 - 6 and 4 + 6 fall outside [0, 9).
        let numbers = routing_table_numbers(TreePosition::new(2, 4), 3);
        assert_eq!(
            numbers.into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3, 5, 6, 7]
        );
    }

    #[test]
    fn test_routing_child_numbers() {
        let children = routing_table_child_numbers(TreePosition::new(1, 0), 2);
        // Only neighbor is 1:1, its children are 2:2 and 2:3.
        assert_eq!(children.into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_routing_symmetric_in_perfect_tree() {
        for fanout in 2..=4u16 {
            for position in perfect_tree_positions(fanout, 4) {
                for neighbor in routing_table_numbers(position, fanout) {
                    let other = TreePosition::new(position.level, neighbor);
                    assert!(
                        routing_table_numbers(other, fanout).contains(&position.number),
                        "fanout {}: {} -> {} not symmetric",
                        fanout,
                        position,
                        other
                    );
                }
            }
        }
    }

    #[test]
    fn test_perfect_tree_parents_are_legal() {
        for fanout in 2..=4u16 {
            for position in perfect_tree_positions(fanout, 3) {
                if let Some(parent) = position.parent(fanout) {
                    assert!(is_child_slot(parent, position, fanout));
                }
            }
        }
    }
}
