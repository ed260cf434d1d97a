//! Progress records: the completion state of an element for one attempt.
//!
//! A progress record is immutable. Each evaluation that changes an element's
//! completion appends a new record carrying the full variant state, so the
//! latest record for an element is always self-contained.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, clamp_unit, courseware::CoursewareElementType};

// ─── Completion ──────────────────────────────────────────────────────────────

/// How far through an element a student is, and how sure we are of it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Completion {
  pub value:      f64,
  pub confidence: f64,
}

impl Completion {
  pub const COMPLETE: Self = Self { value: 1.0, confidence: 1.0 };

  /// Build a completion, clamping both fields into `[0, 1]`.
  pub fn new(value: f64, confidence: f64) -> Self {
    Self { value: clamp_unit(value), confidence: clamp_unit(confidence) }
  }

  pub fn is_completed(&self) -> bool { self.value >= 1.0 }
}

// ─── Progression ─────────────────────────────────────────────────────────────

/// The progression directive a scenario fired for a walkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressionType {
  /// Try the walkable again; starts a new attempt.
  Repeat,
  Complete,
  /// Complete and move the enclosing graph pathway to another walkable.
  CompleteAndGoTo { walkable_id: Uuid },
}

impl ProgressionType {
  pub fn is_completing(self) -> bool { !matches!(self, Self::Repeat) }
}

// ─── Variant state ───────────────────────────────────────────────────────────

/// Random pathway state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RandomProgress {
  pub completed_walkables:    BTreeSet<Uuid>,
  pub in_progress_element_id: Option<Uuid>,
  pub in_progress_completion: Option<Completion>,
}

/// Graph pathway state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphProgress {
  pub current_walkable_id: Option<Uuid>,
  pub visited_walkables:   BTreeSet<Uuid>,
}

/// Bayesian Knowledge Tracing pathway state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BktProgress {
  /// Probability the skill is learned after the latest observation.
  pub p_ln:                                  f64,
  pub p_correct:                             f64,
  /// Posterior given the observation, before the learning transition.
  pub p_ln_minus_given_actual:               f64,
  pub in_progress_element_id:                Option<Uuid>,
  pub completed_walkables:                   BTreeSet<Uuid>,
  pub child_walkable_completion_values:      BTreeMap<Uuid, f64>,
  pub child_walkable_completion_confidences: BTreeMap<Uuid, f64>,
  /// Observations folded into `p_ln` so far.
  pub observations:                          u32,
  /// Consecutive observations with `p_ln` at or above the mastery threshold.
  pub mastered_streak:                       u32,
}

/// The variant state of a progress record. The variant name serves as the
/// `progress_type` discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressDetail {
  Interactive {
    progression: ProgressionType,
  },
  Activity {
    /// Set when the activity's own scenario fired the progression.
    progression:               Option<ProgressionType>,
    child_pathway_completions: BTreeMap<Uuid, Completion>,
  },
  Linear {
    child_completions: BTreeMap<Uuid, Completion>,
  },
  Random(RandomProgress),
  Graph(GraphProgress),
  Bkt(BktProgress),
}

impl ProgressDetail {
  /// The discriminant string stored in the `progress_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Interactive { .. } => "interactive",
      Self::Activity { .. } => "activity",
      Self::Linear { .. } => "linear",
      Self::Random(_) => "random",
      Self::Graph(_) => "graph",
      Self::Bkt(_) => "bkt",
    }
  }

  /// Serialise the inner payload (without the type tag) for the
  /// `detail_json` database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON payload stored in the
  /// database.
  pub fn from_parts(discriminant: &str, data: serde_json::Value) -> Result<Self> {
    if !matches!(
      discriminant,
      "interactive" | "activity" | "linear" | "random" | "graph" | "bkt"
    ) {
      return Err(Error::UnknownProgressType(discriminant.to_owned()));
    }
    let wrapped = serde_json::json!({ "type": discriminant, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// An immutable progress record for one element, student and attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
  pub id:                      Uuid,
  pub deployment_id:           Uuid,
  pub change_id:               Uuid,
  pub courseware_element_id:   Uuid,
  pub courseware_element_type: CoursewareElementType,
  pub student_id:              Uuid,
  pub attempt_id:              Uuid,
  pub evaluation_id:           Uuid,
  pub completion:              Completion,
  pub detail:                  ProgressDetail,
  pub recorded_at:             DateTime<Utc>,
}

/// Input to [`crate::store::LearnerStore::record_progress`].
#[derive(Debug, Clone)]
pub struct NewProgress {
  pub deployment_id:           Uuid,
  pub change_id:               Uuid,
  pub courseware_element_id:   Uuid,
  pub courseware_element_type: CoursewareElementType,
  pub student_id:              Uuid,
  pub attempt_id:              Uuid,
  pub evaluation_id:           Uuid,
  pub completion:              Completion,
  pub detail:                  ProgressDetail,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn completion_is_clamped() {
    let c = Completion::new(1.4, -0.2);
    assert_eq!(c, Completion { value: 1.0, confidence: 0.0 });
    assert!(c.is_completed());
    assert_eq!(Completion::new(f64::NAN, 0.5).value, 0.0);
  }

  #[test]
  fn detail_parts_roundtrip_keeps_maps() {
    let child = Uuid::new_v4();
    let detail = ProgressDetail::Linear {
      child_completions: BTreeMap::from([(child, Completion::new(0.5, 1.0))]),
    };
    let json = detail.to_json().unwrap();
    assert!(json.get("child_completions").is_some());

    let back = ProgressDetail::from_parts(detail.discriminant(), json).unwrap();
    assert_eq!(back, detail);
  }

  #[test]
  fn unknown_discriminant_is_rejected() {
    let err = ProgressDetail::from_parts("free", serde_json::Value::Null)
      .unwrap_err();
    assert!(matches!(err, Error::UnknownProgressType(ref d) if d == "free"));
  }

  #[test]
  fn go_to_serialises_with_target() {
    let target = Uuid::nil();
    let json = serde_json::to_value(ProgressionType::CompleteAndGoTo {
      walkable_id: target,
    })
    .unwrap();
    assert_eq!(json["kind"], "COMPLETE_AND_GO_TO");
    assert_eq!(json["walkable_id"], target.to_string());
  }
}
