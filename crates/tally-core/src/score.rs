//! Score entries and the derived score.
//!
//! A student's score for an element is never stored. It is folded from the
//! append-only stream of [`StudentScoreEntry`] records for that element and
//! attempt; see [`fold_adjustments`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::courseware::CoursewareElementType;

/// How a new value combines with a previous aggregate.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationOperator {
  Add,
  Set,
  Remove,
}

impl MutationOperator {
  /// Combine `value` with `previous` under this operator.
  pub fn apply(self, previous: f64, value: f64) -> f64 {
    match self {
      Self::Add => previous + value,
      Self::Set => value,
      Self::Remove => previous - value,
    }
  }
}

/// One scoring event. `adjustment_value` is the signed delta this entry
/// contributes to the running aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScoreEntry {
  pub id:                 Uuid,
  pub deployment_id:      Uuid,
  pub change_id:          Uuid,
  pub cohort_id:          Uuid,
  pub student_id:         Uuid,
  pub attempt_id:         Uuid,
  pub element_id:         Uuid,
  pub element_type:       CoursewareElementType,
  pub operator:           MutationOperator,
  pub value:              f64,
  pub adjustment_value:   f64,
  pub source_element_id:  Uuid,
  pub source_scenario_id: Option<Uuid>,
  pub source_account_id:  Uuid,
  pub evaluation_id:      Uuid,
  pub recorded_at:        DateTime<Utc>,
}

/// Input to [`crate::store::LearnerStore::record_score_entry`].
#[derive(Debug, Clone)]
pub struct NewScoreEntry {
  pub deployment_id:      Uuid,
  pub change_id:          Uuid,
  pub cohort_id:          Uuid,
  pub student_id:         Uuid,
  pub attempt_id:         Uuid,
  pub element_id:         Uuid,
  pub element_type:       CoursewareElementType,
  pub operator:           MutationOperator,
  pub value:              f64,
  pub adjustment_value:   f64,
  pub source_element_id:  Uuid,
  pub source_scenario_id: Option<Uuid>,
  pub source_account_id:  Uuid,
  pub evaluation_id:      Uuid,
}

/// Why a score has the value it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreReason {
  /// The student has no attempt at the element.
  NotAttempted,
  /// An attempt exists but nothing has been scored against it.
  Unscored,
  Scored,
}

/// A derived score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
  pub value:  f64,
  pub reason: ScoreReason,
}

impl Score {
  pub const NOT_ATTEMPTED: Self =
    Self { value: 0.0, reason: ScoreReason::NotAttempted };

  /// Fold an ordered entry stream into a score.
  pub fn from_entries(entries: &[StudentScoreEntry]) -> Self {
    if entries.is_empty() {
      return Self { value: 0.0, reason: ScoreReason::Unscored };
    }
    Self {
      value:  fold_adjustments(entries.iter().map(|e| e.adjustment_value)),
      reason: ScoreReason::Scored,
    }
  }
}

/// Left-fold adjustments in creation order, flooring the running total at
/// zero after every step. `[5, 7, -15, 2]` folds to `2`, not `0`.
pub fn fold_adjustments(adjustments: impl IntoIterator<Item = f64>) -> f64 {
  adjustments
    .into_iter()
    .fold(0.0, |running, adjustment| f64::max(0.0, running + adjustment))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fold_clamps_after_each_step() {
    assert_eq!(fold_adjustments([5.0, 7.0, -15.0, 2.0]), 2.0);
  }

  #[test]
  fn fold_of_nothing_is_zero() {
    assert_eq!(fold_adjustments(std::iter::empty()), 0.0);
  }

  #[test]
  fn fold_never_goes_negative() {
    assert_eq!(fold_adjustments([-3.0]), 0.0);
    assert_eq!(fold_adjustments([1.0, -3.0, -1.0]), 0.0);
  }
}
