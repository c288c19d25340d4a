/// Error types for vote-service
///
/// Every variant tells the caller whether to act (swipe more, fix the request)
/// or simply retry later.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Not enough preferred items to compare: {available} available, 2 required")]
    InsufficientPreferences { available: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl VoteError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            VoteError::InsufficientPreferences { .. } => "insufficient_preferences",
            VoteError::NotFound(_) => "not_found",
            VoteError::InvalidArgument(_) => "invalid_argument",
            VoteError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// True when retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoteError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for VoteError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => VoteError::NotFound("row not found".to_string()),
            other => VoteError::StoreUnavailable(other.to_string()),
        }
    }
}

impl ResponseError for VoteError {
    fn status_code(&self) -> StatusCode {
        match self {
            VoteError::InsufficientPreferences { .. } => StatusCode::BAD_REQUEST,
            VoteError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            VoteError::NotFound(_) => StatusCode::NOT_FOUND,
            VoteError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        }))
    }
}

/// Result type alias for vote operations
pub type VoteResult<T> = Result<T, VoteError>;
