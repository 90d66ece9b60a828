//! Configuration errors.

use thiserror::Error;

/// Invalid tree configuration.
///
/// These abort the whole run: every position comparison depends on the
/// fanout and scale being valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Fanout below 2.
    #[error("fanout {0} is below 2")]
    InvalidFanout(u16),

    /// Negative position scale (K).
    #[error("position scale {0} is below 0")]
    NegativeScale(i64),

    /// Position outside `[0, fanout^level)` or with a negative coordinate.
    #[error("invalid position {level}:{number} for fanout {fanout}")]
    InvalidPosition { level: i64, number: i64, fanout: u16 },
}
