use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use crate::models::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("the room is already booked from {start} to {end}", start = .start_time.format("%Y-%m-%d %H:%M"), end = .end_time.format("%Y-%m-%d %H:%M"))]
    Conflict {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("cannot move booking from {from} to {to}: {reason}", from = .from.as_str(), to = .to.as_str())]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
        reason: String,
    },

    #[error("invalid payment update: {0}")]
    InvalidPaymentUpdate(String),

    #[error("booking was modified concurrently, retry")]
    StaleWrite,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } | AppError::StaleWrite => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } | AppError::InvalidPaymentUpdate(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = match &self {
            AppError::Conflict {
                start_time,
                end_time,
            } => serde_json::json!({
                "error": self.to_string(),
                "conflict": { "start_time": start_time, "end_time": end_time },
            }),
            AppError::Database(_) | AppError::Internal(_) => {
                serde_json::json!({ "error": "internal error" })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
