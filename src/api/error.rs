//! API errors with structured JSON responses

use crate::core::error::SuggestionError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] SuggestionError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Workflow(SuggestionError::Validation(message.into()))
    }

    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        let ApiError::Workflow(err) = self;
        match err {
            SuggestionError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            SuggestionError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            SuggestionError::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            SuggestionError::AlreadySubmitted => (StatusCode::CONFLICT, "ALREADY_SUBMITTED"),
            SuggestionError::ActiveSuggestionExists => {
                (StatusCode::CONFLICT, "ACTIVE_SUGGESTION_EXISTS")
            }
            SuggestionError::IllegalTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ILLEGAL_TRANSITION")
            }
            SuggestionError::InvalidMeetingState(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_MEETING_STATE")
            }
            SuggestionError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            SuggestionError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let ApiError::Workflow(err) = &self;

        let message = match err {
            SuggestionError::Persistence(e) => {
                error!("request failed: {e}");
                "an internal error occurred".to_owned()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}
