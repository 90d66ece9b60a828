//! Codes written by the simulation logger.

use std::fmt;

/// Kind of a relationship record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NeighborRelationship {
    Parent,
    Child,
    AdjacentLeft,
    AdjacentRight,
    RoutingTableNeighbor,
    RoutingTableNeighborChild,
    Unknown,
}

impl NeighborRelationship {
    /// All kinds a validator consumes.
    pub const VALIDATED: [NeighborRelationship; 6] = [
        NeighborRelationship::Parent,
        NeighborRelationship::Child,
        NeighborRelationship::AdjacentLeft,
        NeighborRelationship::AdjacentRight,
        NeighborRelationship::RoutingTableNeighbor,
        NeighborRelationship::RoutingTableNeighborChild,
    ];

    /// Decode the stored relationship code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Parent),
            1 => Some(Self::Child),
            2 => Some(Self::AdjacentLeft),
            3 => Some(Self::AdjacentRight),
            4 => Some(Self::RoutingTableNeighbor),
            5 => Some(Self::RoutingTableNeighborChild),
            6 => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Parent => 0,
            Self::Child => 1,
            Self::AdjacentLeft => 2,
            Self::AdjacentRight => 3,
            Self::RoutingTableNeighbor => 4,
            Self::RoutingTableNeighborChild => 5,
            Self::Unknown => 6,
        }
    }

    /// Whether a subject may hold several related nodes of this kind at once.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            Self::Child | Self::RoutingTableNeighbor | Self::RoutingTableNeighborChild
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Parent => "PARENT",
            Self::Child => "CHILD",
            Self::AdjacentLeft => "ADJACENT_LEFT",
            Self::AdjacentRight => "ADJACENT_RIGHT",
            Self::RoutingTableNeighbor => "ROUTING_TABLE_NEIGHBOR",
            Self::RoutingTableNeighborChild => "ROUTING_TABLE_NEIGHBOR_CHILD",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for NeighborRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Uninit,
    Running,
    Left,
    Failed,
}

impl NodeState {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Uninit),
            1 => Some(Self::Running),
            2 => Some(Self::Left),
            3 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Uninit => 0,
            Self::Running => 1,
            Self::Left => 2,
            Self::Failed => 3,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninit => "UNINIT",
            Self::Running => "RUNNING",
            Self::Left => "LEFT",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Type of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Join,
    Leave,
    FindQuery,
    RequestCountdownStart,
    /// Any code this oracle does not interpret.
    Other(i64),
}

impl EventType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Join,
            1 => Self::Leave,
            3 => Self::FindQuery,
            4 => Self::RequestCountdownStart,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Join => 0,
            Self::Leave => 1,
            Self::FindQuery => 3,
            Self::RequestCountdownStart => 4,
            Self::Other(code) => *code,
        }
    }

    /// Join and leave events are the only ones that change membership.
    pub fn changes_membership(&self) -> bool {
        matches!(self, Self::Join | Self::Leave)
    }
}

/// Message types relevant to join/leave plausibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Join,
    JoinAccept,
    JoinAcceptAck,
    RemoveNeighbor,
    Other(i64),
}

impl MessageType {
    pub fn from_code(code: i64) -> Self {
        match code {
            10 => Self::Join,
            12 => Self::JoinAccept,
            14 => Self::JoinAcceptAck,
            60 => Self::RemoveNeighbor,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Join => 10,
            Self::JoinAccept => 12,
            Self::JoinAcceptAck => 14,
            Self::RemoveNeighbor => 60,
            Self::Other(code) => *code,
        }
    }
}

/// Whether a traffic record was logged by the receiver or the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageMode {
    Receiving,
    Sending,
}

impl MessageMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Receiving),
            1 => Some(Self::Sending),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Receiving => 0,
            Self::Sending => 1,
        }
    }
}
