//! Error types for the vault facade.

use tenantvault_auth::AuthError;
use tenantvault_core::{CoreError, ErrorKind};
use tenantvault_perms::PermsError;
use tenantvault_store::StoreError;
use thiserror::Error;

use crate::bulk::BulkReport;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Caller could not be established.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Item not found.
    #[error("item not found: {0}")]
    NotFound(String),

    /// Item id already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing field or bulk limit exceeded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// At least one element of a bulk call failed.
    #[error("bulk operation failed: {0}")]
    PartialFailure(BulkReport),

    /// Input or record decoding error.
    #[error("record error: {0}")]
    Record(#[from] CoreError),

    /// Access or crypto error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Identity service error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl VaultError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Unauthorized(_) => ErrorKind::Unauthorized,
            VaultError::NotFound(_) => ErrorKind::NotFound,
            VaultError::Conflict(_) => ErrorKind::Conflict,
            VaultError::BadRequest(_) => ErrorKind::BadRequest,
            VaultError::PartialFailure(report) => report
                .first_failure_kind()
                .unwrap_or(ErrorKind::InternalServerError),
            VaultError::Record(e) => e.kind(),
            VaultError::Permission(e) => e.kind(),
            VaultError::Auth(e) => e.kind(),
            VaultError::Store(e) => e.kind(),
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
