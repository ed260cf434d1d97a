use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use tally_core::{
  competency::CompetencyMet,
  event::EventPublisher,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ItemPath {
  pub student_id:  Uuid,
  pub document_id: Uuid,
  pub item_id:     Uuid,
}

/// `GET /students/:s/documents/:doc/items/:item/competency`
pub async fn latest<S, P>(
  State(state): State<AppState<S, P>>,
  Path(path): Path<ItemPath>,
) -> Result<Json<CompetencyMet>, ApiError>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph + 'static,
  P: EventPublisher + 'static,
{
  let met = state
    .engine
    .store()
    .find_latest_competency_met(path.student_id, path.document_id, path.item_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no competency recorded for item {}", path.item_id))
    })?;
  Ok(Json(met))
}
