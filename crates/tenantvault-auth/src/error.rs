//! Error types for the identity service.

use tenantvault_core::ErrorKind;
use thiserror::Error;

use crate::token::TokenError;

/// Errors that can occur in the identity and session service.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, or a token that is not acceptable for the flow.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Token verification failed.
    #[error("token rejected: {0}")]
    Token(#[from] TokenError),

    /// Username already taken, or id collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or malformed input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Principal absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A secret or principal is missing required configuration.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Secret source failure.
    #[error("secret source error: {0}")]
    Secret(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    StoreError(#[from] tenantvault_store::StoreError),

    /// Record decoding failed.
    #[error("core error: {0}")]
    CoreError(#[from] tenantvault_core::CoreError),

    /// Key material failure.
    #[error("perms error: {0}")]
    PermsError(#[from] tenantvault_perms::PermsError),
}

impl AuthError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Unauthorized(_) | AuthError::Token(_) => ErrorKind::Unauthorized,
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::BadRequest(_) => ErrorKind::BadRequest,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::NotConfigured(_) | AuthError::Secret(_) => ErrorKind::InternalServerError,
            AuthError::StoreError(e) => e.kind(),
            AuthError::CoreError(e) => e.kind(),
            AuthError::PermsError(e) => e.kind(),
        }
    }
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, AuthError>;
