//! Principal records.
//!
//! A principal is the identity behind a session token. The identity service
//! owns these records exclusively; other layers read them through
//! [`ProfileFields`] or the authorizer context and never see key material.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::PasswordHash;
use crate::error::{CoreError, Result};
use crate::Record;

/// Shortest token lifetime a principal may ask for, in seconds.
pub const MIN_EXPIRY_SECS: i64 = 1;

/// Longest token lifetime a principal may ask for (one day), in seconds.
pub const MAX_EXPIRY_SECS: i64 = 86_400;

/// An identity record as stored in the auth table.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Stable identifier, assigned once at signup.
    pub user_id: String,

    /// Unique login name (looked up via the username index).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<PasswordHash>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Preferred token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_in_sec: Option<i64>,

    /// Hex-encoded X25519 public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Hex-encoded X25519 secret key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    /// Comma-delimited `group:action` claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<String>,

    /// Free-form values copied into every session token.
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub context: Record,

    /// Remaining profile attributes (email, mobile, ...).
    #[serde(flatten)]
    pub extra: Record,
}

/// The profile fields the authorizer requires before it allows a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub user_id: String,
    pub username: String,
    pub tenant_id: String,
    pub claims: Option<String>,
}

impl Principal {
    /// Create a bare principal with only an identifier.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            password_hash: None,
            tenant_id: None,
            expiry_in_sec: None,
            public_key: None,
            private_key: None,
            claims: None,
            context: Record::new(),
            extra: Record::new(),
        }
    }

    /// Decode from a stored record.
    pub fn from_record(record: Record) -> Result<Self> {
        let principal: Principal = serde_json::from_value(Value::Object(record))
            .map_err(|e| CoreError::MalformedRecord(e.to_string()))?;
        if principal.user_id.is_empty() {
            return Err(CoreError::MissingField("userId"));
        }
        Ok(principal)
    }

    /// Encode into a record for storage.
    pub fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::MalformedRecord(
                "principal did not encode to an object".into(),
            )),
            Err(e) => Err(CoreError::MalformedRecord(e.to_string())),
        }
    }

    /// The principal's preferred token lifetime, clamped to the allowed range.
    pub fn preferred_expiry(&self) -> Option<i64> {
        self.expiry_in_sec.map(clamp_expiry)
    }

    /// Whether both halves of the key pair are present.
    pub fn has_key_pair(&self) -> bool {
        matches!(
            (&self.public_key, &self.private_key),
            (Some(public), Some(private)) if !public.is_empty() && !private.is_empty()
        )
    }

    /// Profile fields, or `None` when any required field is missing or empty.
    pub fn profile_fields(&self) -> Option<ProfileFields> {
        let username = self.username.as_deref().filter(|s| !s.is_empty())?;
        let tenant_id = self.tenant_id.as_deref().filter(|s| !s.is_empty())?;
        if self.user_id.is_empty() {
            return None;
        }
        Some(ProfileFields {
            user_id: self.user_id.clone(),
            username: username.to_string(),
            tenant_id: tenant_id.to_string(),
            claims: self.claims.clone().filter(|c| !c.trim().is_empty()),
        })
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("tenant_id", &self.tenant_id)
            .field("expiry_in_sec", &self.expiry_in_sec)
            .field("has_key_pair", &self.has_key_pair())
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

/// Clamp a requested token lifetime to `[MIN_EXPIRY_SECS, MAX_EXPIRY_SECS]`.
pub fn clamp_expiry(secs: i64) -> i64 {
    secs.clamp(MIN_EXPIRY_SECS, MAX_EXPIRY_SECS)
}
