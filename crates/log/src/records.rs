//! Records as stored in the event log.
//!
//! Records are immutable and ordered by their sequence id. Positions are
//! kept raw here; [`SnapshotReader`](crate::SnapshotReader) turns them into
//! [`Node`](minhton_oracle_types::Node)s with horizontal values.

use minhton_oracle_types::{
    tree, ConfigurationError, EventType, Fanout, MessageMode, MessageType, NeighborRelationship,
    NodeState, PeerAddress, TreePosition,
};

/// Sequence id of a record within its table.
pub type SequenceId = i64;

/// Numeric event id.
pub type EventId = u64;

/// Records carrying a table-local sequence id.
pub trait Sequenced {
    fn sequence_id(&self) -> SequenceId;
}

/// A node reference as logged.
///
/// The position is None for a node that was not yet initialized; the peer
/// is None for a placeholder that only marks a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredNode {
    pub position: Option<TreePosition>,
    pub peer: Option<PeerAddress>,
}

impl StoredNode {
    pub fn new(position: Option<TreePosition>, peer: Option<PeerAddress>) -> Self {
        Self { position, peer }
    }

    /// An initialized node with a known address.
    pub fn at(level: u32, number: u64, host: impl Into<String>, port: u16) -> Self {
        Self {
            position: Some(TreePosition::new(level, number)),
            peer: Some(PeerAddress::new(host, port)),
        }
    }

    /// Same position and same host.
    ///
    /// Ports are ignored: traffic records and state records of the same
    /// node may come from different sockets.
    pub fn same_host_and_position(&self, other: &StoredNode) -> bool {
        self.position == other.position
            && self.peer.as_ref().map(|p| &p.host) == other.peer.as_ref().map(|p| &p.host)
    }
}

/// Turn stored level/number columns into a position.
///
/// Both NULL means "uninitialized". Negative coordinates, numbers outside
/// `0..fanout^level` and levels too deep for `fanout^level` to fit a u64 are
/// rejected.
pub fn position_from_columns(
    level: Option<i64>,
    number: Option<i64>,
    fanout: Fanout,
) -> Result<Option<TreePosition>, ConfigurationError> {
    let (level, number) = match (level, number) {
        (Some(level), Some(number)) => (level, number),
        _ => return Ok(None),
    };

    let invalid = ConfigurationError::InvalidPosition {
        level,
        number,
        fanout,
    };
    let (Ok(l), Ok(n)) = (u32::try_from(level), u64::try_from(number)) else {
        return Err(invalid);
    };
    match tree::nodes_on_level(fanout, l) {
        Some(width) if n < width => Ok(Some(TreePosition::new(l, n))),
        _ => Err(invalid),
    }
}

/// Process-wide information about one simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralInfo {
    /// Total number of nodes the run was configured with.
    pub number_of_nodes: u64,
    pub fanout: Fanout,
    /// Deepest level seen in any node-state record.
    pub max_observed_level: Option<u32>,
    /// Largest number seen in any node-state record.
    pub max_observed_number: Option<u64>,
}

impl GeneralInfo {
    pub fn new(number_of_nodes: u64, fanout: Fanout) -> Self {
        Self {
            number_of_nodes,
            fanout,
            max_observed_level: None,
            max_observed_number: None,
        }
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Recording order.
    pub order: SequenceId,
    pub event_id: EventId,
    pub timestamp_ms: i64,
    pub event_type: EventType,
}

impl Sequenced for EventRecord {
    fn sequence_id(&self) -> SequenceId {
        self.order
    }
}

/// A lifecycle transition of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStateRecord {
    pub id: SequenceId,
    pub timestamp_ms: i64,
    pub event_id: EventId,
    pub node: StoredNode,
    pub state: NodeState,
}

impl Sequenced for NodeStateRecord {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }
}

/// A directed, typed relationship between two nodes.
///
/// An object without a position clears the relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub id: SequenceId,
    pub timestamp_ms: i64,
    pub event_id: EventId,
    pub kind: NeighborRelationship,
    pub subject: StoredNode,
    pub object: StoredNode,
}

impl Sequenced for RelationshipRecord {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }
}

/// A logged protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRecord {
    pub id: SequenceId,
    pub timestamp_ms: i64,
    pub message_type: MessageType,
    pub mode: MessageMode,
    pub event_id: EventId,
    /// Event this message answers, 0 for messages that start an event.
    pub ref_event_id: EventId,
    pub sender: StoredNode,
    pub target: StoredNode,
}

impl TrafficRecord {
    /// The event this message belongs to: the referenced event if any,
    /// otherwise its own.
    pub fn causing_event(&self) -> EventId {
        if self.ref_event_id != 0 {
            self.ref_event_id
        } else {
            self.event_id
        }
    }
}

impl Sequenced for TrafficRecord {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }
}
