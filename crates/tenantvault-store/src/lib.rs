//! # TenantVault Store
//!
//! Storage abstraction for TenantVault. The identity service and the data
//! engine only ever talk to the [`KeyStore`] trait; durability, indexing and
//! retries belong to the adapter behind it.
//!
//! ## Key Types
//!
//! - [`KeyStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-backed adapter (JSON bodies, `json_extract` lookups)
//! - [`MemoryStore`] - In-memory adapter for tests
//! - [`RecordKey`] - Primary key of a record, possibly composite
//! - [`IndexQuery`] - Equality lookup on a secondary index
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tenantvault_store::{IndexQuery, KeyStore, MemoryStore, RecordKey};
//!
//! async fn example() {
//!     let store = MemoryStore::new();
//!     let key = RecordKey::new("id", "item-1");
//!     let record = json!({ "id": "item-1", "createdBy": "u-1" })
//!         .as_object()
//!         .cloned()
//!         .unwrap();
//!
//!     store.put("notes-dev", &key, record).await.unwrap();
//!
//!     let mine = store
//!         .query_index("notes-dev", &IndexQuery::eq("createdBy-index", "createdBy", "u-1"))
//!         .await
//!         .unwrap();
//!     assert_eq!(mine.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Upserts**: `put` replaces whatever is stored under the key.
//! - **Partial updates**: `update` merges attributes, `null` removes one, key
//!   attributes are never rewritten, and `updatedAt` is stamped by the adapter.
//! - **Idempotent deletes**: deleting a missing key is not an error.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{IndexQuery, KeyStore, RecordKey, UPDATED_AT};

pub use tenantvault_core::Record;
