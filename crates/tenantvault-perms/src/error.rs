//! Error types for the permissions module.

use tenantvault_core::ErrorKind;
use thiserror::Error;

use crate::claim::Action;

/// Errors that can occur during permission operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Neither ownership nor a matching claim allows the action.
    #[error("{action} access to item {item_id} denied")]
    Forbidden { item_id: String, action: Action },

    /// Stored key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// The `encPayload` string is not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Payload could not be encoded or decoded as JSON.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] tenantvault_core::CoreError),
}

impl PermsError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PermsError::Forbidden { .. } => ErrorKind::Forbidden,
            PermsError::CoreError(e) => e.kind(),
            _ => ErrorKind::InternalServerError,
        }
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
