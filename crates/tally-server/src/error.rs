//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tally_engine::Error as EngineError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Engine(e) => match e {
        EngineError::InvalidArgument(_) | EngineError::NegativeSetValue(_) => {
          StatusCode::BAD_REQUEST
        }
        EngineError::Structural(_)
        | EngineError::CyclicStructure { .. }
        | EngineError::TooDeep { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Core(_) | EngineError::Store(_) | EngineError::Publish(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn retryable(&self) -> bool {
    match self {
      ApiError::NotFound(_) => false,
      ApiError::Engine(e) => e.is_retryable(),
      ApiError::Store(_) => true,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("request failed: {self}");
    }
    let body = json!({ "error": self.to_string(), "retryable": self.retryable() });
    (status, Json(body)).into_response()
  }
}
