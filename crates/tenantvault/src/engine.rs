//! The claims-based data access engine.
//!
//! Every operation authorizes against the stored item before touching it:
//! the owner may do anything, other callers need a `group:action` claim for
//! the item's group. Payloads are sealed on the way in and opened on the way
//! out for callers holding the right key.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use tenantvault_core::{clean_tags, Item, ItemDraft, Record};
use tenantvault_perms::{authorize, protect, reveal, Action, Caller, PermsError};
use tenantvault_store::{IndexQuery, KeyStore, RecordKey};

use crate::bulk;
use crate::config::EngineConfig;
use crate::error::{Result, VaultError};

/// Bucket holding the caller's own items.
pub const SELF_BUCKET: &str = "self";

/// Key of the grand total in the serialized list shape.
pub const TOTAL_KEY: &str = "total";

/// One bucket of a list result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub total: usize,
    pub data: Vec<Item>,
}

/// The result of [`DataAccess::list`].
///
/// Serializes as `{ "total": n, "self": {...}, "<group>": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResults {
    /// Sum of bucket totals. Items reachable through two buckets count twice.
    pub total: usize,
    #[serde(flatten)]
    pub buckets: BTreeMap<String, Bucket>,
}

impl ListResults {
    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.get(name)
    }
}

/// Data access over item tables.
pub struct DataAccess<S: KeyStore> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: KeyStore> DataAccess<S> {
    /// Create an engine over `store`.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The caller's own items plus one bucket per readable group.
    ///
    /// Buckets are queried concurrently. Any failing bucket fails the call.
    pub async fn list(&self, table: &str, caller: &Caller) -> Result<ListResults> {
        let mut queries = vec![(
            SELF_BUCKET.to_string(),
            IndexQuery::eq(self.config.owner_index.clone(), "createdBy", caller.user_id.clone()),
        )];
        for group in caller.claims.readable_groups() {
            if group == SELF_BUCKET || group == TOTAL_KEY {
                tracing::warn!(group, "claim group collides with a reserved bucket name, skipped");
                continue;
            }
            queries.push((
                group.to_string(),
                IndexQuery::eq(self.config.group_index.clone(), "groupId", group),
            ));
        }

        let buckets = try_join_all(queries.into_iter().map(|(name, query)| async move {
            let records = self.store.query_index(table, &query).await?;
            let data = self.reveal_records(records, caller)?;
            Ok::<_, VaultError>((
                name,
                Bucket {
                    total: data.len(),
                    data,
                },
            ))
        }))
        .await?;

        let buckets: BTreeMap<String, Bucket> = buckets.into_iter().collect();
        let total = buckets.values().map(|b| b.total).sum();
        Ok(ListResults { total, buckets })
    }

    /// Fetch one item the caller may perform `action` on, revealed.
    pub async fn get(&self, table: &str, id: &str, caller: &Caller, action: Action) -> Result<Item> {
        let item = self.fetch_authorized(table, id, caller, action).await?;
        Ok(reveal(item, caller)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an item owned by the caller.
    ///
    /// Managed fields in `input` are taken as item attributes; everything
    /// else becomes the payload.
    pub async fn create(&self, table: &str, input: Value, caller: &Caller) -> Result<Item> {
        let draft = ItemDraft::from_input(input)?;
        let id = draft.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let item = Item {
            id: id.clone(),
            tenant_id: Some(caller.tenant_id.clone()).filter(|t| !t.is_empty()),
            created_by: Some(caller.user_id.clone()),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            group_id: draft.group_id,
            tags: clean_tags(draft.tags.as_deref()),
            share_with: draft.share_with,
            payload: Some(Value::Object(draft.payload)),
            ..Default::default()
        };
        let item = protect(item, caller)?;

        if !self
            .store
            .insert(table, &item_key(&id), item.to_record()?)
            .await?
        {
            return Err(VaultError::Conflict(format!("item {} already exists", id)));
        }
        tracing::debug!(table, item_id = %id, user_id = %caller.user_id, "item created");

        self.get(table, &id, caller, Action::Read).await
    }

    /// Apply a partial update to an existing item.
    ///
    /// Tags are appended to the existing tags; payload fields are merged
    /// over the existing payload one level deep.
    ///
    /// The updated item is read back under `write`, not `read`, so a caller
    /// holding only a write claim gets the item it just changed instead of
    /// `Forbidden` after the write has landed.
    pub async fn update(&self, table: &str, input: Value, caller: &Caller) -> Result<Item> {
        let draft = ItemDraft::from_input(input)?;
        let Some(id) = draft.id else {
            return Err(VaultError::BadRequest("id is required for update".into()));
        };
        let existing = self.get(table, &id, caller, Action::Write).await?;

        let mut changes = Record::new();
        changes.insert("updatedBy".into(), Value::String(caller.user_id.clone()));
        if let Some(group_id) = draft.group_id {
            changes.insert("groupId".into(), Value::String(group_id));
        }
        if let Some(share_with) = draft.share_with {
            changes.insert("shareWith".into(), share_with);
        }
        if let Some(tags) = draft.tags {
            let joined = match existing.tags.as_deref() {
                Some(old) if !old.is_empty() => format!("{},{}", old, tags),
                _ => tags,
            };
            changes.insert("tags".into(), clean_tags(Some(joined.as_str())).map_or(Value::Null, Value::String));
        }

        if !draft.payload.is_empty() {
            if existing.is_sealed() {
                // Still sealed after reveal: the caller cannot open it.
                return Err(PermsError::Forbidden {
                    item_id: id,
                    action: Action::Write,
                }
                .into());
            }

            let mut merged = match existing.payload.clone() {
                Some(Value::Object(fields)) => fields,
                _ => Record::new(),
            };
            merged.extend(draft.payload);

            let candidate = Item {
                payload: Some(Value::Object(merged)),
                enc_payload: None,
                ..existing
            };
            let protected = protect(candidate, caller)?;
            match (protected.payload, protected.enc_payload) {
                (_, Some(sealed)) => {
                    changes.insert("encPayload".into(), Value::String(sealed));
                    changes.insert("payload".into(), Value::Null);
                }
                (payload, None) => {
                    changes.insert("payload".into(), payload.unwrap_or(Value::Null));
                    changes.insert("encPayload".into(), Value::Null);
                }
            }
        }

        self.store.update(table, &item_key(&id), changes).await?;
        tracing::debug!(table, item_id = %id, user_id = %caller.user_id, "item updated");

        self.get(table, &id, caller, Action::Write).await
    }

    /// Delete an item the caller may delete.
    pub async fn delete(&self, table: &str, id: &str, caller: &Caller) -> Result<()> {
        self.fetch_authorized(table, id, caller, Action::Delete).await?;
        self.store.delete(table, &item_key(id)).await?;
        tracing::info!(table, item_id = id, user_id = %caller.user_id, "item deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk
    // ─────────────────────────────────────────────────────────────────────────

    /// Create every input concurrently.
    pub async fn create_many(&self, table: &str, inputs: Vec<Value>, caller: &Caller) -> Result<Vec<Item>> {
        self.check_bulk_len(inputs.len())?;
        let results = join_all(inputs.into_iter().map(|input| self.create(table, input, caller))).await;
        bulk::collect(results, |item| item.id.clone())
    }

    /// Update every input concurrently.
    pub async fn update_many(&self, table: &str, inputs: Vec<Value>, caller: &Caller) -> Result<Vec<Item>> {
        self.check_bulk_len(inputs.len())?;
        let results = join_all(inputs.into_iter().map(|input| self.update(table, input, caller))).await;
        bulk::collect(results, |item| item.id.clone())
    }

    /// Delete every id concurrently, returning the deleted ids.
    pub async fn delete_many(&self, table: &str, ids: Vec<String>, caller: &Caller) -> Result<Vec<String>> {
        self.check_bulk_len(ids.len())?;
        let results = join_all(ids.into_iter().map(|id| async move {
            self.delete(table, &id, caller).await?;
            Ok::<_, VaultError>(id)
        }))
        .await;
        bulk::collect(results, Clone::clone)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    async fn fetch_authorized(&self, table: &str, id: &str, caller: &Caller, action: Action) -> Result<Item> {
        let record = self
            .store
            .get(table, &item_key(id))
            .await?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        let item = Item::from_record(record)?;
        authorize(caller, &item, action)?;
        Ok(item)
    }

    fn reveal_records(&self, records: Vec<Record>, caller: &Caller) -> Result<Vec<Item>> {
        records
            .into_iter()
            .map(|record| Ok(reveal(Item::from_record(record)?, caller)?))
            .collect()
    }

    fn check_bulk_len(&self, len: usize) -> Result<()> {
        if len > self.config.max_bulk_items {
            return Err(VaultError::BadRequest(format!(
                "bulk input of {} exceeds the limit of {}",
                len, self.config.max_bulk_items
            )));
        }
        Ok(())
    }
}

fn item_key(id: &str) -> RecordKey {
    RecordKey::new("id", id)
}
