//! Event log access for the MINHTON topology oracle.
//!
//! - [`EventLog`]: read-only, ordered access to a recorded run, backed by
//!   SQLite ([`SqliteEventLog`]) or memory ([`MemoryEventLog`])
//! - [`SnapshotReader`]: reconstructs existing nodes and relationships at
//!   any event with last-writer-wins resolution

mod error;
mod records;
mod snapshot;
mod sqlite;
mod store;

pub use error::DataError;
pub use records::{
    position_from_columns, EventId, EventRecord, GeneralInfo, NodeStateRecord,
    RelationshipRecord, SequenceId, Sequenced, StoredNode, TrafficRecord,
};
pub use snapshot::{
    latest_value_by_key, max_level, Bound, EventRef, Relation, Snapshot, SnapshotReader,
};
pub use sqlite::{is_store_file, SqliteEventLog, STORE_EXTENSION};
pub use store::{EventLog, MemoryEventLog};
