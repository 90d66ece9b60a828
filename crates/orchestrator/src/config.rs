//! Configuration for validation runs.

use crate::OracleError;
use minhton_oracle_types::{ConfigurationError, DEFAULT_POSITION_SCALE};
use serde::Deserialize;
use std::path::Path;

/// Configuration for a validation run.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    /// Scale constant K of the horizontal position mapping.
    pub position_scale: i64,

    /// Event sampling for large logs.
    pub sampling: SamplingPolicy,

    /// Run null/perfect balance checks after membership changes.
    pub check_tree_balance: bool,

    /// Run the height balance check after membership changes.
    pub check_height_balance: bool,

    /// Run the join/leave plausibility checks once per store.
    pub check_join_plausibility: bool,

    /// Check events on the rayon thread pool.
    pub parallel: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            position_scale: DEFAULT_POSITION_SCALE,
            sampling: SamplingPolicy::default(),
            check_tree_balance: true,
            check_height_balance: true,
            check_join_plausibility: true,
            parallel: false,
        }
    }
}

impl OracleConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, OracleError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let contents = std::fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings no run can use.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.position_scale < 0 {
            return Err(ConfigurationError::NegativeScale(self.position_scale).into());
        }
        self.sampling.validate()
    }

    /// Set the position scale K.
    pub fn with_position_scale(mut self, scale: i64) -> Self {
        self.position_scale = scale;
        self
    }

    /// Set the sampling policy.
    pub fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampling.seed = seed;
        self
    }

    /// Turn sampling off; every event is checked.
    pub fn without_sampling(mut self) -> Self {
        self.sampling.enabled = false;
        self
    }

    pub fn with_tree_balance(mut self, enabled: bool) -> Self {
        self.check_tree_balance = enabled;
        self
    }

    pub fn with_height_balance(mut self, enabled: bool) -> Self {
        self.check_height_balance = enabled;
        self
    }

    pub fn with_join_plausibility(mut self, enabled: bool) -> Self {
        self.check_join_plausibility = enabled;
        self
    }

    /// Check events in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Probabilistic skipping of relationship checks on large logs.
///
/// Above `threshold` events, each event is skipped independently with
/// probability `scale * log_base(event_count / divisor)`, clamped to
/// `[0, 1)`. At or below the threshold nothing is skipped.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingPolicy {
    pub enabled: bool,
    pub threshold: usize,
    pub scale: f64,
    pub divisor: f64,
    pub log_base: f64,
    /// Seed of the sampling RNG; equal seeds give equal samples.
    pub seed: u64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 2000,
            scale: 0.5,
            divisor: 40.0,
            log_base: 50.0,
            seed: 12345,
        }
    }
}

impl SamplingPolicy {
    /// A policy that never skips.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Probability of skipping any one event of a log with `event_count`
    /// events.
    pub fn skip_probability(&self, event_count: usize) -> f64 {
        if !self.enabled || event_count <= self.threshold {
            return 0.0;
        }
        let p = self.scale * (event_count as f64 / self.divisor).log(self.log_base);
        if p.is_nan() {
            return 0.0;
        }
        p.clamp(0.0, 1.0 - f64::EPSILON)
    }

    fn validate(&self) -> Result<(), OracleError> {
        if !self.enabled {
            return Ok(());
        }
        if self.divisor.is_nan() || self.divisor <= 0.0 {
            return Err(OracleError::InvalidSampling(format!(
                "divisor must be positive, got {}",
                self.divisor
            )));
        }
        if self.log_base.is_nan() || self.log_base <= 1.0 {
            return Err(OracleError::InvalidSampling(format!(
                "log_base must be greater than 1, got {}",
                self.log_base
            )));
        }
        if !self.scale.is_finite() || self.scale < 0.0 {
            return Err(OracleError::InvalidSampling(format!(
                "scale must be a non-negative number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}
