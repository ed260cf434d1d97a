//! Error type for `tally-engine`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A caller-supplied value is missing or malformed.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// The published courseware or competency data is inconsistent.
  #[error("structural error: {0}")]
  Structural(String),

  #[error("Negative value is not allowed with a SET operator (got {0})")]
  NegativeSetValue(f64),

  #[error("cycle detected at {kind} {id}")]
  CyclicStructure { kind: &'static str, id: Uuid },

  #[error("{kind} walk from {id} exceeded the maximum depth of {max_depth}")]
  TooDeep {
    kind:      &'static str,
    id:        Uuid,
    max_depth: usize,
  },

  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("publish error: {0}")]
  Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn publish<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Publish(Box::new(e))
  }

  /// Only infrastructure failures are worth retrying; everything else
  /// signals bad input or bad published data.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Store(_) | Self::Publish(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
