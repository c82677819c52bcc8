// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
///
/// The exam-session variants are terminal for the request and are surfaced
/// verbatim; nothing in the service retries them.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // 500 Internal Server Error (storage or other infrastructure failure)
    InternalServerError(String),

    // 400 Bad Request (request DTO failed validation)
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found (session, exam or question absent)
    NotFound(String),

    // 409 Conflict (concurrent write to the same session)
    Conflict(String),

    // 403 Forbidden (not enrolled, or not the owner of the session)
    Forbidden(String),

    // 403 Forbidden (wrong exam password)
    InvalidCredential(String),

    // 409 Conflict (outside the exam's start/end window)
    WindowClosed(String),

    // 409 Conflict (session is already completed)
    AlreadyCompleted(String),

    // 410 Gone (time ran out; detected during this request)
    Expired(String),

    // 409 Conflict (review requested before the attempt is over)
    NotReady(String),

    // 400 Bad Request (question does not belong to the session's exam)
    InvalidQuestion(String),
}

impl AppError {
    /// Machine readable code placed next to the message in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "INTERNAL",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::AuthError(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            AppError::WindowClosed(_) => "WINDOW_CLOSED",
            AppError::AlreadyCompleted(_) => "ALREADY_COMPLETED",
            AppError::Expired(_) => "EXPIRED",
            AppError::NotReady(_) => "NOT_READY",
            AppError::InvalidQuestion(_) => "INVALID_QUESTION",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::InvalidQuestion(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) | AppError::InvalidCredential(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_)
            | AppError::WindowClosed(_)
            | AppError::AlreadyCompleted(_)
            | AppError::NotReady(_) => StatusCode::CONFLICT,
            AppError::Expired(_) => StatusCode::GONE,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Forbidden(msg)
            | AppError::InvalidCredential(msg)
            | AppError::WindowClosed(msg)
            | AppError::AlreadyCompleted(msg)
            | AppError::Expired(msg)
            | AppError::NotReady(msg)
            | AppError::InvalidQuestion(msg) => msg,
        };
        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
