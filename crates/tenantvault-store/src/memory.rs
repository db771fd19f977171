//! In-memory implementation of the KeyStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use tenantvault_core::Record;

use crate::error::{Result, StoreError};
use crate::traits::{matches_filter, merge_changes, now_rfc3339, IndexQuery, KeyStore, RecordKey};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    /// table name -> encoded key -> record. BTreeMap keeps scans ordered.
    tables: RwLock<HashMap<String, BTreeMap<String, Record>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records in a table.
    pub fn len(&self, table: &str) -> usize {
        self.read()
            .map(|tables| tables.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, BTreeMap<String, Record>>>> {
        self.tables
            .read()
            .map_err(|e| {
                tracing::error!(error = %e, "memory store lock poisoned");
                StoreError::Backend(format!("lock poisoned: {}", e))
            })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, BTreeMap<String, Record>>>> {
        self.tables
            .write()
            .map_err(|e| {
                tracing::error!(error = %e, "memory store lock poisoned");
                StoreError::Backend(format!("lock poisoned: {}", e))
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<Record>> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.get(&key.encode()))
            .cloned())
    }

    async fn put(&self, table: &str, key: &RecordKey, mut record: Record) -> Result<()> {
        key.stamp(&mut record);
        let mut tables = self.write()?;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.encode(), record);
        Ok(())
    }

    async fn insert(&self, table: &str, key: &RecordKey, mut record: Record) -> Result<bool> {
        key.stamp(&mut record);
        let mut tables = self.write()?;
        let rows = tables.entry(table.to_string()).or_default();
        let encoded = key.encode();
        if rows.contains_key(&encoded) {
            return Ok(false);
        }
        rows.insert(encoded, record);
        Ok(true)
    }

    async fn update(&self, table: &str, key: &RecordKey, changes: Record) -> Result<Record> {
        let mut tables = self.write()?;
        let existing = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&key.encode()))
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                key: key.encode(),
            })?;

        merge_changes(existing, key, changes, now_rfc3339());
        Ok(existing.clone())
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()> {
        let mut tables = self.write()?;
        if let Some(rows) = tables.get_mut(table) {
            rows.remove(&key.encode());
        }
        Ok(())
    }

    async fn query_index(&self, table: &str, query: &IndexQuery) -> Result<Vec<Record>> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|record| query.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scan(&self, table: &str, filter: &Record) -> Result<Vec<Record>> {
        let tables = self.read()?;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|record| matches_filter(record, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::UPDATED_AT;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let key = RecordKey::new("id", "i1");

        store
            .put("items", &key, record(json!({ "createdBy": "u1" })))
            .await
            .unwrap();

        let got = store.get("items", &key).await.unwrap().unwrap();
        assert_eq!(got["id"], json!("i1"));
        assert_eq!(got["createdBy"], json!("u1"));
        assert!(store.get("other", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_insert_is_conditional() {
        let store = MemoryStore::new();
        let key = RecordKey::new("id", "i1");

        assert!(store.insert("items", &key, record(json!({ "v": 1 }))).await.unwrap());
        assert!(!store.insert("items", &key, record(json!({ "v": 2 }))).await.unwrap());

        let got = store.get("items", &key).await.unwrap().unwrap();
        assert_eq!(got["v"], json!(1));
    }

    #[tokio::test]
    async fn test_memory_store_update() {
        let store = MemoryStore::new();
        let key = RecordKey::new("id", "i1");
        store
            .put("items", &key, record(json!({ "a": 1, "b": 2 })))
            .await
            .unwrap();

        let updated = store
            .update("items", &key, record(json!({ "a": 3, "b": null })))
            .await
            .unwrap();
        assert_eq!(updated["a"], json!(3));
        assert!(!updated.contains_key("b"));
        assert!(updated.contains_key(UPDATED_AT));

        let missing = store
            .update("items", &RecordKey::new("id", "nope"), Record::new())
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_memory_store_index_and_scan() {
        let store = MemoryStore::new();
        for (id, owner, group) in [("i1", "u1", "g1"), ("i2", "u1", "g2"), ("i3", "u2", "g1")] {
            store
                .put(
                    "items",
                    &RecordKey::new("id", id),
                    record(json!({ "createdBy": owner, "groupId": group })),
                )
                .await
                .unwrap();
        }

        let by_owner = store
            .query_index("items", &IndexQuery::eq("createdBy-index", "createdBy", "u1"))
            .await
            .unwrap();
        assert_eq!(by_owner.len(), 2);

        let by_group = store
            .scan("items", &record(json!({ "groupId": "g1" })))
            .await
            .unwrap();
        assert_eq!(by_group.len(), 2);

        assert_eq!(store.scan("items", &Record::new()).await.unwrap().len(), 3);
        assert_eq!(store.len("items"), 3);
    }

    #[tokio::test]
    async fn test_memory_store_delete_is_idempotent() {
        let store = MemoryStore::new();
        let key = RecordKey::new("id", "i1");
        store.put("items", &key, Record::new()).await.unwrap();

        store.delete("items", &key).await.unwrap();
        store.delete("items", &key).await.unwrap();
        assert!(store.get("items", &key).await.unwrap().is_none());
    }
}
