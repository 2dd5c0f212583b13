use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::order::OrderStatus;

#[derive(Debug, Error, PartialEq)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("order {0} is not ready for delivery")]
    OrderNotReady(String),

    #[error("order {0} already has an active assignment")]
    AlreadyAssigned(String),

    #[error("rider {0} is unavailable")]
    RiderUnavailable(String),

    #[error("order {0} is not completed")]
    OrderNotCompleted(String),

    #[error("feedback already exists for order {0}")]
    DuplicateFeedback(String),

    #[error("rating must be an integer between 1 and 5, got {0}")]
    InvalidRating(String),

    #[error("response cannot be empty")]
    EmptyResponse,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable name of the failure, sent next to the message.
    pub const fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Forbidden(_) => "forbidden",
            AppError::OrderNotReady(_) => "order_not_ready",
            AppError::AlreadyAssigned(_) => "already_assigned",
            AppError::RiderUnavailable(_) => "rider_unavailable",
            AppError::OrderNotCompleted(_) => "order_not_completed",
            AppError::DuplicateFeedback(_) => "duplicate_feedback",
            AppError::InvalidRating(_) => "invalid_rating",
            AppError::EmptyResponse => "empty_response",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Transient(_) => "transient",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. }
            | AppError::OrderNotReady(_)
            | AppError::AlreadyAssigned(_)
            | AppError::RiderUnavailable(_)
            | AppError::OrderNotCompleted(_)
            | AppError::DuplicateFeedback(_) => StatusCode::CONFLICT,
            AppError::InvalidRating(_) | AppError::EmptyResponse => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (self.status_code(), body).into_response()
    }
}
