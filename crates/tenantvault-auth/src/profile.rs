//! Profile (customer) records created alongside a principal at signup.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use tenantvault_core::Record;
use tenantvault_store::{KeyStore, RecordKey};

use crate::error::{AuthError, Result};

/// Status given to profiles that do not specify one.
pub const DEFAULT_STATUS: &str = "pending";

/// Creates the profile record that accompanies a new principal.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create a profile under `tenant_id`, returning the stored record.
    async fn create_profile(&self, tenant_id: &str, profile: Record) -> Result<Record>;

    /// Look up a profile.
    async fn profile(&self, tenant_id: &str, id: &str) -> Result<Option<Record>>;
}

/// Profiles kept in a key store table keyed by `(tenantId, id)`.
pub struct TableProfileStore<S: KeyStore> {
    store: Arc<S>,
    table: String,
}

impl<S: KeyStore> TableProfileStore<S> {
    pub fn new(store: Arc<S>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    fn key(tenant_id: &str, id: &str) -> RecordKey {
        RecordKey::new("tenantId", tenant_id).with("id", id)
    }
}

#[async_trait]
impl<S: KeyStore> ProfileStore for TableProfileStore<S> {
    async fn create_profile(&self, tenant_id: &str, mut profile: Record) -> Result<Record> {
        let id = match profile.remove("id") {
            None | Some(Value::Null) => Uuid::new_v4().to_string(),
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(other) => {
                return Err(AuthError::BadRequest(format!(
                    "profile id must be a non-empty string, got {}",
                    other
                )))
            }
        };
        profile.remove("tenantId");
        profile
            .entry("status")
            .or_insert_with(|| Value::String(DEFAULT_STATUS.into()));

        let key = Self::key(tenant_id, &id);
        if !self.store.insert(&self.table, &key, profile).await? {
            return Err(AuthError::Conflict(format!("profile {} already exists", id)));
        }

        self.store
            .get(&self.table, &key)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("profile {}", id)))
    }

    async fn profile(&self, tenant_id: &str, id: &str) -> Result<Option<Record>> {
        Ok(self.store.get(&self.table, &Self::key(tenant_id, id)).await?)
    }
}
