//! Errors that stop a validation run.
//!
//! Violated invariants are not errors; they come back as failing
//! [`CheckOutcome`](minhton_oracle_validators::CheckOutcome)s inside a
//! [`ValidationReport`](crate::ValidationReport).

use minhton_oracle_log::DataError;
use minhton_oracle_types::ConfigurationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// The store could not be read. Fails that store only.
    #[error("event log error: {0}")]
    Data(#[from] DataError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("invalid sampling policy: {0}")]
    InvalidSampling(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no event stores found at {0}")]
    NoStores(PathBuf),
}

impl OracleError {
    /// Whether this error invalidates the whole run rather than one store.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            OracleError::Configuration(_)
                | OracleError::InvalidSampling(_)
                | OracleError::ConfigParse(_)
        )
    }
}
