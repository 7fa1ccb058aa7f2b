//! RFQ engine error types.

use auth::AuthError;
use thiserror::Error;
use trade_core::CoreError;

#[derive(Error, Debug)]
pub enum RfqError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RfqError {
    pub fn rfq_not_found() -> Self {
        RfqError::NotFound("RFQ not found".to_string())
    }

    pub fn response_not_found() -> Self {
        RfqError::NotFound("RFQ response not found".to_string())
    }

    /// A compare-and-swap lost to a concurrent writer.
    pub fn concurrent_update() -> Self {
        RfqError::Conflict("record was modified concurrently, retry the request".to_string())
    }
}

impl From<CoreError> for RfqError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => RfqError::Validation(msg),
            CoreError::NotFound(msg) => RfqError::NotFound(msg),
            CoreError::Conflict(msg) => RfqError::Conflict(msg),
            CoreError::Database(e) => RfqError::Database(e),
            other => RfqError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for RfqError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden(msg) => RfqError::Forbidden(msg),
            AuthError::Validation(msg) => RfqError::Validation(msg),
            AuthError::NotFound(msg) => RfqError::NotFound(msg),
            AuthError::Conflict(msg) => RfqError::Conflict(msg),
            other => RfqError::Internal(other.to_string()),
        }
    }
}

pub type RfqResult<T> = std::result::Result<T, RfqError>;
