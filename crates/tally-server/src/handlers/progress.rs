use axum::{
  Json,
  extract::{Path, State},
};
use tally_core::{
  event::EventPublisher,
  progress::Progress,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};

use super::ElementPath;
use crate::{AppState, error::ApiError};

/// `GET /deployments/:d/students/:s/elements/:e/progress`
pub async fn latest<S, P>(
  State(state): State<AppState<S, P>>,
  Path(path): Path<ElementPath>,
) -> Result<Json<Progress>, ApiError>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph + 'static,
  P: EventPublisher + 'static,
{
  let progress = state
    .engine
    .store()
    .find_latest_progress(path.deployment_id, path.element_id, path.student_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no progress at element {}", path.element_id))
    })?;
  Ok(Json(progress))
}
