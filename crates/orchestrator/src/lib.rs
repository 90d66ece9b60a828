//! Topology invariant oracle for recorded MINHTON simulation runs.
//!
//! # Overview
//!
//! An [`Orchestrator`] walks the events of one event log, takes a snapshot
//! of the network after each event and runs the structural checks of
//! `minhton_oracle_validators` against it:
//!
//! - parent/child, adjacency and routing-table checks, sampled on large
//!   logs
//! - tree and height balance after every JOIN or LEAVE
//! - join/leave plausibility once per log, from the message traffic
//!
//! Validation stops at the first event with a failing fatal check. The
//! [`ValidationReport`] carries that failure, every advisory finding up to
//! it and the plausibility outcomes.
//!
//! # Batches
//!
//! [`discover_stores`] and [`run_batch`] validate every store of a
//! directory. A store that cannot be read fails on its own; an invalid
//! [`OracleConfig`] fails the batch.

mod batch;
mod config;
mod error;
mod orchestrator;
mod plausibility;
mod report;

pub use batch::{discover_stores, run_batch, validate_store, StoreResult};
pub use config::{OracleConfig, SamplingPolicy};
pub use error::OracleError;
pub use orchestrator::{Orchestrator, PlannedCheck};
pub use plausibility::JoinPlausibility;
pub use report::{Advisory, EventFailure, ValidationReport};
