//! Test helpers for the MINHTON oracle.
//!
//! - [`LogBuilder`]: scripts event logs in memory, including joins, leaves
//!   and the relationships of a correct network
//! - [`write_sqlite_store`]: writes a scripted log to disk in the layout of
//!   the simulation logger

mod builder;
mod store;

pub use builder::{host, stored, LogBuilder, NODE_PORT};
pub use store::write_sqlite_store;
