//! Core types for the MINHTON topology oracle.
//!
//! This crate holds everything that is pure tree arithmetic and needs no
//! access to the event store:
//!
//! - [`TreePosition`], [`PeerAddress`] and [`Node`] value types
//! - [`PositionMapper`], the memoized horizontal order of tree positions
//! - Parent/child numbering, routing-table neighbor numbers and
//!   perfect-tree sizes (see [`tree`])
//! - The relationship, node-state, event and message codes used by the
//!   simulation logger

mod error;
mod identifiers;
mod kinds;
mod position;
pub mod tree;

pub use error::ConfigurationError;
pub use identifiers::{Fanout, Node, PeerAddress, PositionValue, TreePosition};
pub use kinds::{EventType, MessageMode, MessageType, NeighborRelationship, NodeState};
pub use position::{PositionMapper, DEFAULT_POSITION_SCALE};
