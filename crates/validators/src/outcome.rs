//! Verdicts and counter-examples.
//!
//! A failed invariant is data, not an error: every check returns a
//! [`CheckOutcome`] whether or not it holds.

use minhton_oracle_types::Node;
use std::fmt;

/// Every check the oracle knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    ParentChildBidirectional,
    ChildCount,
    ChildPositions,
    ParentPositions,
    AdjacentBidirectional,
    AdjacentLocations,
    AdjacentBoundary,
    RoutingNeighborPositions,
    RoutingNeighborBidirectional,
    RoutingNeighborChildPositions,
    RoutingNeighborChildCompleteness,
    PerfectBalance,
    NullBalance,
    HeightBalance,
    JoinEventCount,
    JoinedNodeCount,
    JoinEventsExceedLeaves,
    JoinedNodesExceedLeaves,
    JoinAcknowledgedByRequester,
    JoinedNodesRunning,
}

impl CheckKind {
    /// Human-readable description of the condition that must hold.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ParentChildBidirectional => "a is child of b <=> b is parent of a",
            Self::ChildCount => "parents below the deepest level have exactly fanout children",
            Self::ChildPositions => "children sit in the child slots of their parent",
            Self::ParentPositions => "the parent of l:n is (l-1):(n/fanout)",
            Self::AdjacentBidirectional => "adjacent left of a is b <=> adjacent right of b is a",
            Self::AdjacentLocations => "adjacent left < node < adjacent right",
            Self::AdjacentBoundary => {
                "only the leftmost node lacks an adjacent left, only the rightmost an adjacent right"
            }
            Self::RoutingNeighborPositions => "routing-table neighbors sit at n +- d*fanout^i",
            Self::RoutingNeighborBidirectional => "routing-table neighborship is symmetric",
            Self::RoutingNeighborChildPositions => {
                "routing-table neighbor children are children of legal neighbor positions"
            }
            Self::RoutingNeighborChildCompleteness => {
                "every child of a routing-table neighbor is a known neighbor child"
            }
            Self::PerfectBalance => "a tree of perfect size has every level full",
            Self::NullBalance => "every level above the deepest is full",
            Self::HeightBalance => "sibling subtree heights differ by at most one",
            Self::JoinEventCount => "join events while building equal the nodes after the root",
            Self::JoinedNodeCount => "acknowledged joins while building equal the nodes after the root",
            Self::JoinEventsExceedLeaves => "join events are not outnumbered by leave events",
            Self::JoinedNodesExceedLeaves => "acknowledged joins are not outnumbered by leave events",
            Self::JoinAcknowledgedByRequester => "the node that requests a join acknowledges it",
            Self::JoinedNodesRunning => "every acknowledged join appears as a running node",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ParentChildBidirectional => "parent-child bidirectionality",
            Self::ChildCount => "child count",
            Self::ChildPositions => "child positions",
            Self::ParentPositions => "parent positions",
            Self::AdjacentBidirectional => "adjacent bidirectionality",
            Self::AdjacentLocations => "adjacent locations",
            Self::AdjacentBoundary => "adjacent boundary",
            Self::RoutingNeighborPositions => "routing-table neighbor positions",
            Self::RoutingNeighborBidirectional => "routing-table neighbor bidirectionality",
            Self::RoutingNeighborChildPositions => "routing-table neighbor child positions",
            Self::RoutingNeighborChildCompleteness => "routing-table neighbor child completeness",
            Self::PerfectBalance => "perfect balance",
            Self::NullBalance => "null balance",
            Self::HeightBalance => "height balance",
            Self::JoinEventCount => "join event count",
            Self::JoinedNodeCount => "joined node count",
            Self::JoinEventsExceedLeaves => "join events vs leaves",
            Self::JoinedNodesExceedLeaves => "joined nodes vs leaves",
            Self::JoinAcknowledgedByRequester => "join acknowledged by requester",
            Self::JoinedNodesRunning => "joined nodes running",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a violated check fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A violation fails the event and the store.
    Fatal,
    /// Violations are reported but never flip the verdict.
    Advisory,
}

/// Evidence for a violated check.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterExample {
    /// A single offending node.
    Node(Node),
    /// An ordered pair, e.g. (node, offending neighbor).
    Pair(Node, Node),
    /// A node, its neighbor and the neighbor's conflicting back-reference.
    Triple(Node, Node, Node),
    /// A node, a related node and everything the related node lists.
    Listing {
        node: Node,
        related: Node,
        listed: Vec<Node>,
    },
    /// A node with its adjacent neighbors, where present.
    Adjacents {
        node: Node,
        left: Option<Node>,
        right: Option<Node>,
    },
    /// A level with the wrong number of nodes.
    Level { level: u32, expected: u64, actual: u64 },
    /// Expected and observed counts.
    Count { expected: i64, actual: i64 },
    /// Free-form evidence.
    Note(String),
}

impl fmt::Display for CounterExample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(node) => write!(f, "{}", node),
            Self::Pair(a, b) => write!(f, "{} -> {}", a, b),
            Self::Triple(a, b, c) => write!(f, "{} -> {} -> {}", a, b, c),
            Self::Listing {
                node,
                related,
                listed,
            } => {
                write!(f, "{} -> {} lists [", node, related)?;
                for (i, entry) in listed.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", entry)?;
                }
                write!(f, "]")
            }
            Self::Adjacents { node, left, right } => {
                let show = |n: &Option<Node>| match n {
                    Some(n) => n.to_string(),
                    None => "none".to_string(),
                };
                write!(
                    f,
                    "{} <- {} -> {}",
                    show(left),
                    node,
                    show(right)
                )
            }
            Self::Level {
                level,
                expected,
                actual,
            } => write!(
                f,
                "level {}: expected {} nodes, found {}",
                level, expected, actual
            ),
            Self::Count { expected, actual } => {
                write!(f, "expected {}, found {}", expected, actual)
            }
            Self::Note(note) => f.write_str(note),
        }
    }
}

/// Verdict of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub severity: Severity,
    pub valid: bool,
    pub counter_examples: Vec<CounterExample>,
}

impl CheckOutcome {
    /// A fatal check that holds.
    pub fn passed(check: CheckKind) -> Self {
        Self {
            check,
            severity: Severity::Fatal,
            valid: true,
            counter_examples: Vec::new(),
        }
    }

    /// A fatal check that holds iff there are no violations.
    pub fn from_violations(check: CheckKind, violations: Vec<CounterExample>) -> Self {
        Self {
            check,
            severity: Severity::Fatal,
            valid: violations.is_empty(),
            counter_examples: violations,
        }
    }

    /// Mark this outcome advisory.
    pub fn advisory(mut self) -> Self {
        self.severity = Severity::Advisory;
        self
    }

    /// A violated fatal check.
    pub fn is_failure(&self) -> bool {
        !self.valid && self.severity == Severity::Fatal
    }

    /// A violated advisory check.
    pub fn is_advisory_finding(&self) -> bool {
        !self.valid && self.severity == Severity::Advisory
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match (self.valid, self.severity) {
            (true, _) => "ok",
            (false, Severity::Fatal) => "FAILED",
            (false, Severity::Advisory) => "advisory",
        };
        write!(f, "{} [{}]: {}", self.check, verdict, self.check.description())?;
        for example in &self.counter_examples {
            write!(f, "\n    {}", example)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minhton_oracle_types::{PeerAddress, PositionMapper, TreePosition};

    #[test]
    fn test_advisory_never_fails() {
        let mut mapper = PositionMapper::new(2, 100).unwrap();
        let node = Node::new(
            TreePosition::ROOT,
            Some(PeerAddress::new("10.0.0.1", 2000)),
            &mut mapper,
        );

        let outcome =
            CheckOutcome::from_violations(CheckKind::ChildCount, vec![CounterExample::Node(node)])
                .advisory();
        assert!(!outcome.valid);
        assert!(!outcome.is_failure());
        assert!(outcome.is_advisory_finding());

        let fatal = CheckOutcome::from_violations(
            CheckKind::ChildPositions,
            vec![CounterExample::Note("x".into())],
        );
        assert!(fatal.is_failure());
        assert!(!CheckOutcome::passed(CheckKind::NullBalance).is_failure());
    }

    #[test]
    fn test_display_lists_counter_examples() {
        let outcome = CheckOutcome::from_violations(
            CheckKind::NullBalance,
            vec![CounterExample::Level {
                level: 1,
                expected: 2,
                actual: 1,
            }],
        );
        let rendered = outcome.to_string();
        assert!(rendered.starts_with("null balance [FAILED]"));
        assert!(rendered.contains("level 1: expected 2 nodes, found 1"));
    }
}
