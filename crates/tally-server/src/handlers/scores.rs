use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use tally_core::{
  event::EventPublisher,
  score::Score,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};
use uuid::Uuid;

use super::ElementPath;
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ScoreParams {
  /// Score a specific attempt. Defaults to the latest one.
  pub attempt_id: Option<Uuid>,
}

/// `GET /deployments/:d/students/:s/elements/:e/score[?attempt_id=...]`
///
/// Always answers 200; an element never attempted scores `NOT_ATTEMPTED`.
pub async fn compute<S, P>(
  State(state): State<AppState<S, P>>,
  Path(path): Path<ElementPath>,
  Query(params): Query<ScoreParams>,
) -> Result<Json<Score>, ApiError>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph + 'static,
  P: EventPublisher + 'static,
{
  let score = state
    .engine
    .scores()
    .compute_score(
      path.deployment_id,
      path.student_id,
      path.element_id,
      params.attempt_id,
    )
    .await?;
  Ok(Json(score))
}
