//! Error types for event log access.

use minhton_oracle_types::ConfigurationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reading an event store.
///
/// A data error fails the store it came from; sibling stores in a batch are
/// still validated.
#[derive(Debug, Error)]
pub enum DataError {
    /// Underlying SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The singleton configuration row is absent or has no fanout.
    #[error("General table has no configuration row")]
    MissingGeneralInfo,

    /// A required table does not exist.
    #[error("Required table {0} is missing")]
    MissingTable(&'static str),

    /// A row could not be interpreted.
    #[error("Malformed row in {table}: {reason}")]
    MalformedRow { table: &'static str, reason: String },

    /// A snapshot was requested for an event the log does not contain.
    #[error("Unknown event id {0}")]
    UnknownEvent(u64),

    /// The path is not an event store.
    #[error("Not a store file: {0}")]
    NotAStoreFile(PathBuf),

    /// The stored fanout or a stored position is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
