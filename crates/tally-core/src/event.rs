//! Events published after learner state changes.
//!
//! Downstream consumers (notifications, grade passback, indexing) subscribe
//! through whatever transport implements [`EventPublisher`]. The engine only
//! needs to hand events over.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  competency::CompetencyMet,
  progress::{Completion, Progress},
  score::{Score, StudentScoreEntry},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LearnerEvent {
  ProgressUpdated {
    progress: Progress,
  },
  ScoreUpdated {
    entry: StudentScoreEntry,
    /// The element's score after the entry was applied.
    score: Score,
  },
  CompetencyUpdated {
    award: CompetencyMet,
  },
  GradePassback {
    deployment_id: Uuid,
    student_id:    Uuid,
    element_id:    Uuid,
    score:         Score,
    completion:    Option<Completion>,
  },
}

impl LearnerEvent {
  pub fn student_id(&self) -> Uuid {
    match self {
      Self::ProgressUpdated { progress } => progress.student_id,
      Self::ScoreUpdated { entry, .. } => entry.student_id,
      Self::CompetencyUpdated { award } => award.student_id,
      Self::GradePassback { student_id, .. } => *student_id,
    }
  }
}

/// The outbound side of the event bus.
pub trait EventPublisher: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn publish(
    &self,
    event: LearnerEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
