//! Validation of many stores in one run.

use crate::{OracleConfig, OracleError, Orchestrator, ValidationReport};
use minhton_oracle_log::{is_store_file, SqliteEventLog, STORE_EXTENSION};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one store of a batch.
#[derive(Debug)]
pub struct StoreResult {
    pub path: PathBuf,
    /// A report, or the error that kept the store from being validated.
    pub outcome: Result<ValidationReport, OracleError>,
}

impl StoreResult {
    /// The store was read and every fatal check held.
    pub fn passed(&self) -> bool {
        matches!(&self.outcome, Ok(report) if report.passed())
    }
}

/// Event stores at `path`: the file itself, or every store file directly
/// inside the directory, sorted by path.
pub fn discover_stores(path: &Path) -> Result<Vec<PathBuf>, OracleError> {
    if path.is_file() {
        return if is_store_file(path) {
            Ok(vec![path.to_path_buf()])
        } else {
            Err(OracleError::NoStores(path.to_path_buf()))
        };
    }

    let io_error = |source| OracleError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut stores = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_error)? {
        let candidate = entry.map_err(io_error)?.path();
        if is_store_file(&candidate) {
            stores.push(candidate);
        }
    }
    if stores.is_empty() {
        return Err(OracleError::NoStores(path.to_path_buf()));
    }
    stores.sort();
    info!(
        directory = %path.display(),
        stores = stores.len(),
        extension = STORE_EXTENSION,
        "Discovered event stores"
    );
    Ok(stores)
}

/// Open and validate one store. The store is closed before returning.
pub fn validate_store(path: &Path, config: &OracleConfig) -> Result<ValidationReport, OracleError> {
    let log = SqliteEventLog::open(path)?;
    Orchestrator::new(config.clone()).validate(path.display().to_string(), &log)
}

/// Validate every store in `paths`, in order.
///
/// An invalid configuration fails the whole batch before any store is
/// opened. A store that cannot be read fails on its own and the batch
/// moves on.
pub fn run_batch(paths: &[PathBuf], config: &OracleConfig) -> Result<Vec<StoreResult>, OracleError> {
    config.validate()?;

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let outcome = match validate_store(path, config) {
            Err(err) if err.is_fatal_for_run() => return Err(err),
            Err(err) => {
                warn!(store = %path.display(), error = %err, "Store could not be validated");
                Err(err)
            }
            Ok(report) => Ok(report),
        };
        results.push(StoreResult {
            path: path.clone(),
            outcome,
        });
    }

    let passed = results.iter().filter(|r| r.passed()).count();
    info!(stores = results.len(), passed, "Batch finished");
    Ok(results)
}
