//! The attempt and progress propagation engine.
//!
//! Every evaluation of a walkable is anchored to an attempt chain that
//! mirrors the courseware ancestry, then walks that ancestry one level at a
//! time: progress is recomputed per pathway type, score entries roll up to
//! every ancestor, and competency awards roll up the document-item graph.
//!
//! The engine is generic over any backend implementing the `tally-core`
//! store traits and over any [`EventPublisher`].

#![allow(async_fn_in_trait)]

pub mod ancestry;
pub mod attempt;
pub mod competency;
pub mod driver;
pub mod error;
pub mod progress;
pub mod publish;
pub mod score;

pub use driver::{EvaluationOutcome, GradeReport};
pub use error::{Error, Result};
pub use publish::BroadcastPublisher;

use std::sync::Arc;

use serde::Deserialize;
use tally_core::{
  event::EventPublisher,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};

use attempt::AttemptResolver;
use competency::CompetencyPropagator;
use score::ScoreAggregator;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_max_depth() -> usize { 64 }

fn default_publish_capacity() -> usize { 1024 }

/// Engine tuning, deserialised from the `[engine]` table of the server config.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// Upper bound on any upward walk (courseware ancestry or competency
  /// items). Exceeding it is reported instead of recursing forever.
  #[serde(default = "default_max_depth")]
  pub max_depth:        usize,
  /// Buffer size of the in-process event channel.
  #[serde(default = "default_publish_capacity")]
  pub publish_capacity: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_depth:        default_max_depth(),
      publish_capacity: default_publish_capacity(),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Entry point tying the components to one backend and one publisher.
///
/// Cloning is cheap: the store and publisher are reference-counted.
pub struct Engine<S, P> {
  store:     Arc<S>,
  publisher: Arc<P>,
  config:    EngineConfig,
}

impl<S, P> Clone for Engine<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      publisher: Arc::clone(&self.publisher),
      config:    self.config.clone(),
    }
  }
}

impl<S, P> Engine<S, P>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph,
  P: EventPublisher,
{
  pub fn new(store: Arc<S>, publisher: Arc<P>, config: EngineConfig) -> Self {
    Self { store, publisher, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn attempts(&self) -> AttemptResolver<'_, S> {
    AttemptResolver::new(&self.store, self.config.max_depth)
  }

  pub fn scores(&self) -> ScoreAggregator<'_, S> {
    ScoreAggregator::new(&self.store, self.config.max_depth)
  }

  pub fn competency(&self) -> CompetencyPropagator<'_, S> {
    CompetencyPropagator::new(&self.store, self.config.max_depth)
  }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
