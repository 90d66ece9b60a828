//! Domain-specific identifier types.

use crate::PositionMapper;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Maximum number of children per node.
pub type Fanout = u16;

/// Logical coordinates of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePosition {
    /// Depth from the root (root = 0).
    pub level: u32,
    /// Index among the nodes of the same level, left to right.
    pub number: u64,
}

impl TreePosition {
    /// The root position `0:0`.
    pub const ROOT: Self = TreePosition {
        level: 0,
        number: 0,
    };

    /// Create a position.
    pub const fn new(level: u32, number: u64) -> Self {
        Self { level, number }
    }

    /// Whether this is the root position.
    pub fn is_root(&self) -> bool {
        self.level == 0
    }

    /// Position of the parent (`level - 1`, `number / fanout`).
    ///
    /// Returns None for the root.
    pub fn parent(&self, fanout: Fanout) -> Option<Self> {
        if self.level == 0 {
            None
        } else {
            Some(TreePosition::new(self.level - 1, self.number / fanout as u64))
        }
    }

    /// Whether `number` lies within `[0, fanout^level)`.
    pub fn is_valid(&self, fanout: Fanout) -> bool {
        match (fanout as u64).checked_pow(self.level) {
            Some(width) => self.number < width,
            // Wider than u64 can express, every u64 number fits.
            None => true,
        }
    }
}

impl fmt::Display for TreePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.number)
    }
}

/// Network address of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Horizontal order key produced by [`PositionMapper`].
///
/// Totally ordered via [`f64::total_cmp`]; values are only comparable when
/// produced by mappers with the same fanout and scale.
#[derive(Debug, Clone, Copy)]
pub struct PositionValue(pub f64);

impl PositionValue {
    /// Get the raw value.
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for PositionValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PositionValue {}

impl PartialOrd for PositionValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PositionValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for PositionValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for PositionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node as seen in the event log.
///
/// Identity (`==`) is level, number and peer address. Horizontal order is
/// a separate concern: compare [`Node::value`] (or use [`Node::is_left_of`])
/// to decide left/right. Two different nodes may share a position when one
/// replaced the other, so the two notions must never be mixed.
#[derive(Debug, Clone)]
pub struct Node {
    position: TreePosition,
    peer: Option<PeerAddress>,
    fanout: Fanout,
    value: PositionValue,
}

impl Node {
    /// Create a node, computing its horizontal value with `mapper`.
    pub fn new(
        position: TreePosition,
        peer: Option<PeerAddress>,
        mapper: &mut PositionMapper,
    ) -> Self {
        Self {
            position,
            peer,
            fanout: mapper.fanout(),
            value: mapper.value(position),
        }
    }

    pub fn position(&self) -> TreePosition {
        self.position
    }

    pub fn level(&self) -> u32 {
        self.position.level
    }

    pub fn number(&self) -> u64 {
        self.position.number
    }

    pub fn fanout(&self) -> Fanout {
        self.fanout
    }

    /// Peer address, if the node is initialized.
    pub fn peer(&self) -> Option<&PeerAddress> {
        self.peer.as_ref()
    }

    /// A node without a peer address only marks a free slot.
    pub fn is_placeholder(&self) -> bool {
        self.peer.is_none()
    }

    /// Horizontal order key.
    pub fn value(&self) -> PositionValue {
        self.value
    }

    /// Strictly to the left of `other`.
    pub fn is_left_of(&self, other: &Node) -> bool {
        self.value < other.value
    }

    /// Strictly to the right of `other`.
    pub fn is_right_of(&self, other: &Node) -> bool {
        self.value > other.value
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.peer == other.peer
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal nodes share a position, so hashing the position alone stays
        // consistent with `Eq`.
        self.position.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.peer {
            Some(peer) => write!(f, "( {} | {} | m={} )", self.position, peer, self.fanout),
            None => write!(f, "( {} | --- | m={} )", self.position, self.fanout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PositionMapper {
        PositionMapper::new(2, 100).unwrap()
    }

    #[test]
    fn test_parent_position() {
        assert_eq!(TreePosition::ROOT.parent(2), None);
        assert_eq!(
            TreePosition::new(2, 2).parent(2),
            Some(TreePosition::new(1, 1))
        );
        assert_eq!(
            TreePosition::new(2, 8).parent(3),
            Some(TreePosition::new(1, 2))
        );
    }

    #[test]
    fn test_position_validity() {
        assert!(TreePosition::ROOT.is_valid(2));
        assert!(!TreePosition::new(0, 1).is_valid(2));
        assert!(TreePosition::new(3, 7).is_valid(2));
        assert!(!TreePosition::new(3, 8).is_valid(2));
        assert!(TreePosition::new(2, 8).is_valid(3));
    }

    #[test]
    fn test_node_identity_ignores_value_but_not_peer() {
        let mut mapper = mapper();
        let a = Node::new(
            TreePosition::new(1, 0),
            Some(PeerAddress::new("10.0.0.1", 2000)),
            &mut mapper,
        );
        let b = Node::new(
            TreePosition::new(1, 0),
            Some(PeerAddress::new("10.0.0.2", 2000)),
            &mut mapper,
        );
        let c = Node::new(
            TreePosition::new(1, 0),
            Some(PeerAddress::new("10.0.0.1", 2000)),
            &mut mapper,
        );

        assert_ne!(a, b);
        assert_eq!(a, c);
        // Same position, same horizontal value, different identity.
        assert_eq!(a.value(), b.value());
        assert!(!a.is_left_of(&b) && !a.is_right_of(&b));
    }

    #[test]
    fn test_left_right_in_small_tree() {
        let mut mapper = mapper();
        let root = Node::new(TreePosition::ROOT, None, &mut mapper);
        let left = Node::new(TreePosition::new(1, 0), None, &mut mapper);
        let right = Node::new(TreePosition::new(1, 1), None, &mut mapper);

        assert!(left.is_left_of(&root));
        assert!(right.is_right_of(&root));
        assert!(left.is_placeholder());
    }

    #[test]
    fn test_display() {
        let mut mapper = mapper();
        let node = Node::new(
            TreePosition::new(2, 3),
            Some(PeerAddress::new("10.1.1.4", 2000)),
            &mut mapper,
        );
        assert_eq!(node.to_string(), "( 2:3 | 10.1.1.4:2000 | m=2 )");
        assert_eq!(TreePosition::new(2, 3).to_string(), "2:3");
    }
}
