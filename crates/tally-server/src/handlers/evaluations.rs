use axum::{Json, extract::State};
use serde::Deserialize;
use tally_core::{
  evaluation::{EvaluationContext, ScenarioEvaluationResult},
  event::EventPublisher,
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};
use tally_engine::EvaluationOutcome;

use crate::{AppState, error::ApiError};

/// JSON body accepted by `POST /evaluations`.
#[derive(Debug, Deserialize)]
pub struct EvaluationBody {
  pub context: EvaluationContext,
  pub result:  ScenarioEvaluationResult,
}

/// `POST /evaluations`
pub async fn create<S, P>(
  State(state): State<AppState<S, P>>,
  Json(body): Json<EvaluationBody>,
) -> Result<Json<EvaluationOutcome>, ApiError>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph + 'static,
  P: EventPublisher + 'static,
{
  let outcome = state
    .engine
    .handle_evaluation(&body.context, &body.result)
    .await?;
  Ok(Json(outcome))
}
