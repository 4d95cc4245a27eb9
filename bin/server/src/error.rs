//! HTTP error responses.
//!
//! Debate failures are reported to clients as a stable kind plus a
//! user-safe message. The full report, including internal causes, only goes
//! to the log. Requests cut off by the server's own deadline get the same
//! body shape with the kind `request_timeout`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use contrarian_debate::{DebateError, DebateErrorKind};
use rootcause::Report;
use serde::Serialize;

/// A failed API request.
#[derive(Debug)]
pub struct ApiError(Report<DebateError>);

impl From<Report<DebateError>> for ApiError {
    fn from(report: Report<DebateError>) -> Self {
        Self(report)
    }
}

impl ApiError {
    #[must_use]
    pub fn kind(&self) -> DebateErrorKind {
        self.0.current_context().kind()
    }
}

/// Status code for each failure kind.
#[must_use]
pub const fn status_for(kind: DebateErrorKind) -> StatusCode {
    match kind {
        DebateErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        DebateErrorKind::ConversationNotFound => StatusCode::NOT_FOUND,
        DebateErrorKind::GenerationFailed => StatusCode::BAD_GATEWAY,
        DebateErrorKind::PersistenceFailed | DebateErrorKind::StoreUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Message shown to clients, free of internal detail.
#[must_use]
pub fn user_message(error: &DebateError) -> String {
    match error {
        DebateError::InvalidInput { reason } => {
            let mut message = reason.to_string();
            if let Some(first) = message.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            message
        }
        DebateError::ConversationNotFound { .. } => "Conversation not found".to_string(),
        DebateError::GenerationFailed { .. } => {
            "Could not generate a reply right now, please try again".to_string()
        }
        DebateError::PersistenceFailed { .. } => {
            "Could not save the conversation, please try again".to_string()
        }
        DebateError::StoreUnavailable { .. } => {
            "Conversation storage is temporarily unavailable".to_string()
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

/// Kind reported when the request deadline fires before a reply is ready.
pub const REQUEST_TIMEOUT_KIND: &str = "request_timeout";

fn error_response(status: StatusCode, kind: &'static str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: ErrorDetail { kind, message },
        }),
    )
        .into_response()
}

/// Response for a request that outlived the server's deadline.
#[must_use]
pub fn request_timeout_response() -> Response {
    error_response(
        StatusCode::GATEWAY_TIMEOUT,
        REQUEST_TIMEOUT_KIND,
        "The request took too long, please try again".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0.current_context();
        let status = status_for(error.kind());
        tracing::debug!(status = %status, report = ?self.0, "request failed");

        error_response(status, error.kind().as_str(), user_message(error))
    }
}
