//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::wizard::WizardError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// The session is generating, or the requested transition is not allowed right now
    Conflict(String),
    BadRequest(String),
    InternalError(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::Busy | WizardError::UnresolvedFailure => ApiError::Conflict(err.to_string()),
            WizardError::NoFailure | WizardError::NotAtFinalStep => ApiError::BadRequest(err.to_string()),
            WizardError::Serialize(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_not_found_response() {
        let error = ApiError::NotFound("wizard session 'abc' not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.error, "not_found");
    }

    #[tokio::test]
    async fn test_busy_maps_to_conflict() {
        let response = ApiError::from(WizardError::Busy).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_early_save_is_bad_request() {
        let response = ApiError::from(WizardError::NotAtFinalStep).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
