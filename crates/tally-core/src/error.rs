//! Error types for `tally-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{name} must be within [0, 1], got {value}")]
  ProbabilityOutOfRange { name: &'static str, value: f64 },

  #[error("unknown progress type discriminant: {0:?}")]
  UnknownProgressType(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
