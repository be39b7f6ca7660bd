use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum AppError {
    #[error("driver {0} not found")]
    DriverNotFound(Uuid),

    #[error("booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("ride {0} not found")]
    RideNotFound(Uuid),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("driver {0} is not available")]
    DriverUnavailable(Uuid),

    #[error("booking {0} is already assigned")]
    BookingAlreadyAssigned(Uuid),

    #[error("ride {0} is already completed")]
    RideAlreadyCompleted(Uuid),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable failure kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::DriverNotFound(_) => "driver_not_found",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::RideNotFound(_) => "ride_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::DriverUnavailable(_) => "driver_unavailable",
            AppError::BookingAlreadyAssigned(_) => "booking_already_assigned",
            AppError::RideAlreadyCompleted(_) => "ride_already_completed",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DriverNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::RideNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DriverUnavailable(_)
            | AppError::BookingAlreadyAssigned(_)
            | AppError::RideAlreadyCompleted(_)
            | AppError::InvalidTransition(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (self.status_code(), body).into_response()
    }
}

/// Undecodable bodies, unknown enum values included, are caller mistakes.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}
