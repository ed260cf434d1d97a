use axum::{
  Json,
  extract::{Path, State},
};
use tally_core::{
  attempt::Attempt,
  event::EventPublisher,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};

use super::ElementPath;
use crate::{AppState, error::ApiError};

/// `GET /deployments/:d/students/:s/elements/:e/attempt`
///
/// Read-only; a student who never reached the element gets a 404 rather than
/// a freshly created attempt.
pub async fn latest<S, P>(
  State(state): State<AppState<S, P>>,
  Path(path): Path<ElementPath>,
) -> Result<Json<Attempt>, ApiError>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph + 'static,
  P: EventPublisher + 'static,
{
  let attempt = state
    .engine
    .attempts()
    .find_latest_attempt(path.deployment_id, path.element_id, path.student_id)
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no attempt at element {}", path.element_id))
    })?;
  Ok(Json(attempt))
}
