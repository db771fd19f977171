//! Error types for TenantVault Core.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The error taxonomy shared by every layer.
///
/// Each crate error exposes `kind()` so callers outside this workspace can
/// map failures without matching on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Missing or invalid credentials or token.
    Unauthorized,
    /// Authenticated, but ownership and claims do not allow the action.
    Forbidden,
    /// Item or principal absent.
    NotFound,
    /// Malformed input, missing field, bulk limit exceeded.
    BadRequest,
    /// Duplicate username or id.
    Conflict,
    /// Crypto failure or unexpected adapter error.
    InternalServerError,
}

impl ErrorKind {
    /// HTTP status code conventionally associated with this kind.
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::InternalServerError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InternalServerError => "InternalServerError",
        };
        f.write_str(name)
    }
}

/// Errors raised while decoding or normalizing records.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A field has the wrong shape.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The record could not be decoded.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidField { .. } | CoreError::MissingField(_) => ErrorKind::BadRequest,
            CoreError::MalformedRecord(_) => ErrorKind::InternalServerError,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::InternalServerError.status_code(), 500);
    }

    #[test]
    fn test_input_errors_are_bad_requests() {
        assert_eq!(CoreError::MissingField("id").kind(), ErrorKind::BadRequest);
        assert_eq!(
            CoreError::MalformedRecord("x".into()).kind(),
            ErrorKind::InternalServerError
        );
    }
}
