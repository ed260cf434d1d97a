//! Route handlers, one module per resource.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/evaluations` | Body: [`evaluations::EvaluationBody`]; returns the outcome |
//! | `GET`  | `/deployments/:d/students/:s/elements/:e/attempt` | Latest attempt |
//! | `GET`  | `/deployments/:d/students/:s/elements/:e/progress` | Latest progress |
//! | `GET`  | `/deployments/:d/students/:s/elements/:e/score` | Optional `?attempt_id` |
//! | `GET`  | `/students/:s/documents/:doc/items/:item/competency` | Latest award |

pub mod attempts;
pub mod competency;
pub mod evaluations;
pub mod progress;
pub mod scores;

use serde::Deserialize;
use uuid::Uuid;

/// Path parameters shared by the per-element learner routes.
#[derive(Debug, Deserialize)]
pub struct ElementPath {
  pub deployment_id: Uuid,
  pub student_id:    Uuid,
  pub element_id:    Uuid,
}
