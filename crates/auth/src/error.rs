//! Errors raised by the credential and token service.

use thiserror::Error;
use trade_core::CoreError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately says nothing more.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Bad signature, wrong issuer, expired, wrong token type or malformed.
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => AuthError::Validation(msg),
            CoreError::NotFound(msg) => AuthError::NotFound(msg),
            CoreError::Conflict(msg) => AuthError::Conflict(msg),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
