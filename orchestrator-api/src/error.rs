use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator_core::OrchestratorError;
use serde::Serialize;

/// Wraps `OrchestratorError` for the one place it needs an HTTP
/// representation — everywhere else in this crate the error taxonomy
/// speaks for itself via `kind()`.
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::Conflict(_) => StatusCode::CONFLICT,
            OrchestratorError::StaleLease => StatusCode::CONFLICT,
            OrchestratorError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            OrchestratorError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::Permanent(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
