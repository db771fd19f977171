//! SQLite implementation of the KeyStore trait.
//!
//! Records are stored as JSON text in a single `records` table keyed by
//! `(table_name, record_key)`. Index lookups go through `json_extract`, which
//! the v2 migration backs with expression indexes for the attributes the
//! engine queries on. Blocking calls run on `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use tenantvault_core::Record;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{matches_filter, merge_changes, now_rfc3339, IndexQuery, KeyStore, RecordKey};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation against the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                tracing::error!(error = %e, "sqlite connection mutex poisoned");
                StoreError::Backend(format!("mutex poisoned: {}", e))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "sqlite blocking task failed");
            StoreError::Backend(format!("spawn_blocking failed: {}", e))
        })?
    }
}

fn decode_body(body: String) -> Result<Record> {
    match serde_json::from_str(&body)? {
        Value::Object(record) => Ok(record),
        _ => Err(StoreError::Backend("stored body is not a JSON object".into())),
    }
}

fn encode_body(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

/// Map a JSON scalar onto what `json_extract` returns for it.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Attribute names are spliced into the JSON path, so keep them to identifiers.
fn json_path(attribute: &str) -> Result<String> {
    let valid = !attribute.is_empty()
        && attribute
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        tracing::warn!(attribute, "rejected index attribute");
        return Err(StoreError::Backend(format!(
            "unsupported index attribute: {:?}",
            attribute
        )));
    }
    Ok(format!("$.{}", attribute))
}

fn load(conn: &Connection, table: &str, key: &str) -> Result<Option<Record>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM records WHERE table_name = ?1 AND record_key = ?2",
            params![table, key],
            |row| row.get(0),
        )
        .optional()?;
    body.map(decode_body).transpose()
}

fn load_all(conn: &Connection, sql: &str, args: &[SqlValue]) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let bodies = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            row.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    bodies.into_iter().map(decode_body).collect()
}

#[async_trait]
impl KeyStore for SqliteStore {
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<Record>> {
        let table = table.to_string();
        let key = key.encode();
        self.run(move |conn| load(conn, &table, &key)).await
    }

    async fn put(&self, table: &str, key: &RecordKey, mut record: Record) -> Result<()> {
        key.stamp(&mut record);
        let table = table.to_string();
        let key = key.encode();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO records (table_name, record_key, body, written_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (table_name, record_key)
                 DO UPDATE SET body = excluded.body, written_at = excluded.written_at",
                params![table, key, encode_body(&record)?, now_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert(&self, table: &str, key: &RecordKey, mut record: Record) -> Result<bool> {
        key.stamp(&mut record);
        let table = table.to_string();
        let key = key.encode();
        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO records (table_name, record_key, body, written_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![table, key, encode_body(&record)?, now_rfc3339()],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn update(&self, table: &str, key: &RecordKey, changes: Record) -> Result<Record> {
        let table = table.to_string();
        let key = key.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let encoded = key.encode();
            let mut existing = load(&tx, &table, &encoded)?.ok_or_else(|| {
                StoreError::NotFound {
                    table: table.clone(),
                    key: encoded.clone(),
                }
            })?;

            let now = now_rfc3339();
            merge_changes(&mut existing, &key, changes, now.clone());
            tx.execute(
                "UPDATE records SET body = ?3, written_at = ?4
                 WHERE table_name = ?1 AND record_key = ?2",
                params![table, encoded, encode_body(&existing)?, now],
            )?;
            tx.commit()?;
            Ok(existing)
        })
        .await
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()> {
        let table = table.to_string();
        let key = key.encode();
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM records WHERE table_name = ?1 AND record_key = ?2",
                params![table, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn query_index(&self, table: &str, query: &IndexQuery) -> Result<Vec<Record>> {
        let path = json_path(&query.attribute)?;
        let sql = format!(
            "SELECT body FROM records
             WHERE table_name = ?1 AND json_extract(body, '{}') = ?2
             ORDER BY record_key",
            path
        );
        let args = vec![SqlValue::Text(table.to_string()), sql_value(&query.value)];
        let query = query.clone();
        self.run(move |conn| {
            let records = load_all(conn, &sql, &args)?;
            // json_extract folds booleans into integers; re-check on the decoded body.
            Ok(records.into_iter().filter(|r| query.matches(r)).collect())
        })
        .await
    }

    async fn scan(&self, table: &str, filter: &Record) -> Result<Vec<Record>> {
        let args = vec![SqlValue::Text(table.to_string())];
        let filter = filter.clone();
        self.run(move |conn| {
            let records = load_all(
                conn,
                "SELECT body FROM records WHERE table_name = ?1 ORDER BY record_key",
                &args,
            )?;
            Ok(records
                .into_iter()
                .filter(|r| matches_filter(r, &filter))
                .collect())
        })
        .await
    }
}
