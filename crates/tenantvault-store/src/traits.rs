//! KeyStore trait: the abstract interface for record persistence.
//!
//! This trait keeps the identity service and the data engine
//! storage-agnostic. Implementations include SQLite and in-memory (for tests).

use async_trait::async_trait;
use serde_json::Value;

use tenantvault_core::Record;

use crate::error::Result;

/// Attribute stamped by adapters on every `update`.
pub const UPDATED_AT: &str = "updatedAt";

/// Primary key of a record: one or more `(attribute, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    parts: Vec<(String, String)>,
}

impl RecordKey {
    /// A single-attribute key.
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parts: vec![(attribute.into(), value.into())],
        }
    }

    /// Extend into a composite key.
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((attribute.into(), value.into()));
        self
    }

    /// The key attributes in declaration order.
    pub fn parts(&self) -> &[(String, String)] {
        &self.parts
    }

    /// Whether `attribute` is part of this key.
    pub fn contains(&self, attribute: &str) -> bool {
        self.parts.iter().any(|(a, _)| a == attribute)
    }

    /// Stable string form used as the storage key.
    ///
    /// Every attribute and value is length-prefixed (`<len>:<text>`), so
    /// distinct keys never encode to the same string whatever they contain.
    pub fn encode(&self) -> String {
        self.parts
            .iter()
            .map(|(a, v)| format!("{}:{}={}:{}", a.len(), a, v.len(), v))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Write the key attributes into a record.
    pub fn stamp(&self, record: &mut Record) {
        for (attribute, value) in &self.parts {
            record.insert(attribute.clone(), Value::String(value.clone()));
        }
    }
}

/// Equality lookup on one attribute through a named secondary index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    /// Index name, e.g. `createdBy-index`.
    pub index: String,
    /// Attribute the index is built on.
    pub attribute: String,
    /// Value to match.
    pub value: Value,
}

impl IndexQuery {
    /// `attribute = value` on `index`.
    pub fn eq(
        index: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            index: index.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Whether a record satisfies this query.
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.attribute) == Some(&self.value)
    }
}

/// The KeyStore trait: async interface for keyed record persistence.
///
/// Tables are named by the caller; adapters create them lazily. Retries and
/// timeouts are the adapter's responsibility.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Point lookup by primary key.
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<Record>>;

    /// Upsert. Key attributes are written into the record.
    async fn put(&self, table: &str, key: &RecordKey, record: Record) -> Result<()>;

    /// Conditional put: stores the record only if the key is free.
    ///
    /// Returns `false` (and writes nothing) when a record already exists.
    async fn insert(&self, table: &str, key: &RecordKey, record: Record) -> Result<bool>;

    /// Merge `changes` into an existing record and return the result.
    ///
    /// `null` values remove the attribute. Key attributes are never changed.
    /// [`UPDATED_AT`] is stamped with the current time. Fails with
    /// `StoreError::NotFound` when the key does not exist.
    async fn update(&self, table: &str, key: &RecordKey, changes: Record) -> Result<Record>;

    /// Delete by primary key. Missing keys are not an error.
    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()>;

    /// Equality lookup through a secondary index.
    async fn query_index(&self, table: &str, query: &IndexQuery) -> Result<Vec<Record>>;

    /// Full scan, keeping records whose attributes equal every entry in `filter`.
    async fn scan(&self, table: &str, filter: &Record) -> Result<Vec<Record>>;
}

/// Apply update semantics shared by all adapters.
pub(crate) fn merge_changes(existing: &mut Record, key: &RecordKey, changes: Record, now: String) {
    for (attribute, value) in changes {
        if key.contains(&attribute) {
            continue;
        }
        if value.is_null() {
            existing.remove(&attribute);
        } else {
            existing.insert(attribute, value);
        }
    }
    existing.insert(UPDATED_AT.to_string(), Value::String(now));
}

/// Whether `record` matches an equality filter.
pub(crate) fn matches_filter(record: &Record, filter: &Record) -> bool {
    filter
        .iter()
        .all(|(attribute, value)| record.get(attribute) == Some(value))
}

/// Current time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_key_encoding() {
        let key = RecordKey::new("tenantId", "t1").with("id", "c1");
        assert_eq!(key.encode(), "8:tenantId=2:t1;2:id=2:c1");
        assert!(key.contains("id"));
        assert!(!key.contains("createdBy"));
    }

    #[test]
    fn test_record_key_encoding_is_injective() {
        let pairs = [
            (
                RecordKey::new("tenantId", "a#id=b").with("id", "c"),
                RecordKey::new("tenantId", "a").with("id", "b#id=c"),
            ),
            (
                RecordKey::new("tenantId", "a;2:id=1:b").with("id", "c"),
                RecordKey::new("tenantId", "a").with("id", "b;2:id=1:c"),
            ),
            (
                RecordKey::new("a=1:b", "c"),
                RecordKey::new("a", "b=1:c"),
            ),
        ];
        for (left, right) in pairs {
            assert_ne!(left, right);
            assert_ne!(left.encode(), right.encode(), "{:?} vs {:?}", left, right);
        }
    }

    #[test]
    fn test_merge_changes_protects_key_and_removes_nulls() {
        let key = RecordKey::new("id", "i1");
        let mut existing = record(json!({ "id": "i1", "a": 1, "b": 2 }));
        let changes = record(json!({ "id": "hijack", "a": 5, "b": null, "c": "x" }));

        merge_changes(&mut existing, &key, changes, "now".into());

        assert_eq!(existing["id"], json!("i1"));
        assert_eq!(existing["a"], json!(5));
        assert!(!existing.contains_key("b"));
        assert_eq!(existing["c"], json!("x"));
        assert_eq!(existing[UPDATED_AT], json!("now"));
    }

    #[test]
    fn test_filters() {
        let r = record(json!({ "groupId": "g1", "kind": "note" }));
        assert!(matches_filter(&r, &Record::new()));
        assert!(matches_filter(&r, &record(json!({ "groupId": "g1" }))));
        assert!(!matches_filter(&r, &record(json!({ "groupId": "g2" }))));
        assert!(IndexQuery::eq("groupId-index", "groupId", "g1").matches(&r));
        assert!(!IndexQuery::eq("createdBy-index", "createdBy", "g1").matches(&r));
    }
}
