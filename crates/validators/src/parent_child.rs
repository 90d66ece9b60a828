//! Parent/child checks.

use crate::{CheckKind, CheckOutcome, CounterExample};
use indexmap::IndexMap;
use minhton_oracle_log::Snapshot;
use minhton_oracle_types::{tree, Node};

/// Run the four parent/child checks on a snapshot.
///
/// Without any parent or child relationship all four hold vacuously.
pub fn validate_parent_child(snapshot: &Snapshot) -> Vec<CheckOutcome> {
    if snapshot.parent_of.is_empty() && snapshot.children_of.is_empty() {
        return vec![
            CheckOutcome::passed(CheckKind::ParentChildBidirectional),
            CheckOutcome::passed(CheckKind::ChildCount).advisory(),
            CheckOutcome::passed(CheckKind::ChildPositions),
            CheckOutcome::passed(CheckKind::ParentPositions),
        ];
    }

    vec![
        bidirectionality(&snapshot.parent_of, &snapshot.children_of),
        child_count(&snapshot.children_of, snapshot.max_level),
        child_positions(&snapshot.children_of),
        parent_positions(&snapshot.parent_of),
    ]
}

/// `parent_of[a] = b` requires `a` among `children_of[b]`.
///
/// A parent without any child entry counts as listing no children.
pub fn bidirectionality(
    parent_of: &IndexMap<Node, Node>,
    children_of: &IndexMap<Node, Vec<Node>>,
) -> CheckOutcome {
    let mut violations = Vec::new();
    for (child, parent) in parent_of {
        let listed = children_of.get(parent).map(Vec::as_slice).unwrap_or(&[]);
        if !listed.contains(child) {
            violations.push(CounterExample::Listing {
                node: child.clone(),
                related: parent.clone(),
                listed: listed.to_vec(),
            });
        }
    }
    CheckOutcome::from_violations(CheckKind::ParentChildBidirectional, violations)
}

/// Parents above `max_level` have exactly `fanout` children, the rest at
/// most `fanout`.
///
/// Advisory: undercounting is expected while a level is being filled.
pub fn child_count(children_of: &IndexMap<Node, Vec<Node>>, max_level: Option<u32>) -> CheckOutcome {
    let mut violations = Vec::new();
    for (parent, children) in children_of {
        let fanout = parent.fanout() as usize;
        let too_many = children.len() > fanout;
        let too_few = max_level.is_some_and(|max| parent.level() < max) && children.len() < fanout;
        if too_many || too_few {
            violations.push(CounterExample::Node(parent.clone()));
        }
    }
    CheckOutcome::from_violations(CheckKind::ChildCount, violations).advisory()
}

/// Children of `(l, n)` are on level `l+1` with numbers in `[n*f, n*f+f)`.
pub fn child_positions(children_of: &IndexMap<Node, Vec<Node>>) -> CheckOutcome {
    let mut violations = Vec::new();
    for (parent, children) in children_of {
        for child in children {
            if !tree::is_child_slot(parent.position(), child.position(), parent.fanout()) {
                violations.push(CounterExample::Pair(parent.clone(), child.clone()));
            }
        }
    }
    CheckOutcome::from_violations(CheckKind::ChildPositions, violations)
}

/// The parent of `(l, n)` is `(l-1, n/f)`. Violations are (parent, child).
pub fn parent_positions(parent_of: &IndexMap<Node, Node>) -> CheckOutcome {
    let mut violations = Vec::new();
    for (child, parent) in parent_of {
        if child.position().parent(child.fanout()) != Some(parent.position()) {
            violations.push(CounterExample::Pair(parent.clone(), child.clone()));
        }
    }
    CheckOutcome::from_violations(CheckKind::ParentPositions, violations)
}
