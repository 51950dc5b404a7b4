use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::automation::AutomationError;
use crate::queue::QueueError;
use crate::service::QueryError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid account handle: {0}")]
    InvalidAccount(String),

    #[error("the target site rate-limited the lookup")]
    RateLimited,

    #[error("the account belongs to the signed-in viewer")]
    SelfAccount,

    #[error("a lookup for this account is already queued")]
    DuplicateQueued,

    #[error("a lookup for this account is already running")]
    DuplicateRunning,

    #[error("the lookup queue is full")]
    QueueFull,

    #[error("automation failed")]
    Automation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable codes; UI surfaces key off these, not off the
    /// human-readable message.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidAccount(_) => "INVALID_ACCOUNT",
            ApiError::RateLimited => "RATE_LIMITED",
            ApiError::SelfAccount => "SELF_ACCOUNT",
            ApiError::DuplicateQueued => "DUPLICATE_IN_QUEUE",
            ApiError::DuplicateRunning => "DUPLICATE_RUNNING",
            ApiError::QueueFull => "QUEUE_FULL",
            ApiError::Automation(_) => "AUTOMATION_FAILED",
            ApiError::Database(_) => "STORAGE_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidAccount(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::SelfAccount => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DuplicateQueued | ApiError::DuplicateRunning => StatusCode::CONFLICT,
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Automation(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal classes get full detail in the log and a generic body.
        match &self {
            ApiError::Database(err) => error!(%err, "storage failure"),
            ApiError::Automation(detail) => error!(%detail, "automation failure"),
            ApiError::Internal(detail) => error!(%detail, "internal failure"),
            _ => {}
        }

        let body = Json(json!({
            "success": false,
            "error": self.code(),
            "message": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Account(err) => ApiError::InvalidAccount(err.to_string()),
            QueryError::Queue(QueueError::AlreadyQueued(_)) => ApiError::DuplicateQueued,
            QueryError::Queue(QueueError::AlreadyRunning(_)) => ApiError::DuplicateRunning,
            QueryError::Queue(QueueError::Full { .. }) => ApiError::QueueFull,
            QueryError::Queue(QueueError::Shutdown) => {
                ApiError::Internal("queue torn down".to_string())
            }
            QueryError::Automation(err) => ApiError::Automation(err.to_string()),
            QueryError::Storage(err) => ApiError::Database(err),
        }
    }
}

impl From<AutomationError> for ApiError {
    fn from(err: AutomationError) -> Self {
        ApiError::Automation(err.to_string())
    }
}
