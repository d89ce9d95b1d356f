use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{is_foreign_key_violation, is_out_of_range, is_unique_violation};
use crate::workflow::WorkflowError;

/// Body of every error response. `error` is the field the dashboards read.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub error_type: &'static str,
    pub error_id: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Workflow(err) => match err {
                WorkflowError::InvalidTransition { .. }
                | WorkflowError::PrescriptionLocked
                | WorkflowError::OrderNotEligible(_)
                | WorkflowError::NoLinkedPrescription
                | WorkflowError::PrescriptionNotVerified(_)
                | WorkflowError::InsufficientStock { .. }
                | WorkflowError::NotDelivered
                | WorkflowError::AlreadyApplied => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(err) if is_unique_violation(err) || is_foreign_key_violation(err) => {
                StatusCode::CONFLICT
            }
            ApiError::Database(err) if is_out_of_range(err) => StatusCode::BAD_REQUEST,
            ApiError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Workflow(WorkflowError::InsufficientStock { .. }) => "insufficient_stock",
            ApiError::Workflow(_) => match self.status_code() {
                StatusCode::CONFLICT => "invalid_state",
                _ => "validation_error",
            },
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to hand to a client. Database and internal failures are
    /// logged in full and replaced by a generic message.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            ApiError::Database(err) if is_unique_violation(err) => {
                "Record already exists".to_string()
            }
            ApiError::Database(err) if is_foreign_key_violation(err) => {
                "Referenced record is missing or still in use".to_string()
            }
            ApiError::Database(err) if is_out_of_range(err) => "Number is out of range".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            log::error!("[{}] {}", error_id, self);
        } else if matches!(self, ApiError::Workflow(_)) {
            log::warn!("[{}] refused: {}", error_id, self);
        }

        let body = ApiErrorResponse {
            error: self.public_message(),
            error_type: self.error_type(),
            error_id,
        };
        (status, Json(body)).into_response()
    }
}
