//! Evaluation payloads consumed by the engine.
//!
//! Scenario evaluation itself happens elsewhere. The engine receives the
//! result together with the context of the walkable that was evaluated and
//! acts only on the triggered actions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  courseware::{CoursewareElement, Deployment},
  progress::ProgressionType,
  score::MutationOperator,
};

/// Whether the student's answer was judged correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
  Correct,
  Incorrect,
  #[default]
  None,
}

impl Correctness {
  pub fn is_correct(self) -> bool { matches!(self, Self::Correct) }
}

// ─── Triggered actions ───────────────────────────────────────────────────────

/// Change the progress of the evaluated walkable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressAction {
  pub progression: ProgressionType,
}

/// Change the score of a walkable in the evaluated element's ancestry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeScoreAction {
  pub element:  CoursewareElement,
  pub operator: MutationOperator,
  pub value:    f64,
}

/// Change the student's value for a competency document item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeCompetencyMetAction {
  pub document_id:      Uuid,
  pub document_item_id: Uuid,
  pub operator:         MutationOperator,
  pub value:            f64,
}

/// Publish the student's grade for an element to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GradePassbackAction {
  /// Defaults to the deployment's root activity.
  #[serde(default)]
  pub element_id: Option<Uuid>,
}

/// An action fired by a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "context", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggeredAction {
  ChangeProgress(ProgressAction),
  ChangeScore(ChangeScoreAction),
  ChangeCompetency(ChangeCompetencyMetAction),
  GradePassback(GradePassbackAction),
}

/// The outcome of evaluating one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEvaluationResult {
  pub scenario_id:       Option<Uuid>,
  #[serde(default)]
  pub correctness:       Correctness,
  #[serde(default)]
  pub triggered_actions: Vec<TriggeredAction>,
  pub evaluation_result: bool,
}

/// Who was evaluated, where, and under which deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
  pub deployment:    Deployment,
  pub student_id:    Uuid,
  pub evaluation_id: Uuid,
  /// The walkable whose scenarios were evaluated.
  pub element:       CoursewareElement,
}
