//! # TenantVault Core
//!
//! Plain records shared by every TenantVault crate: principals, items, and the
//! error taxonomy that the transport layer maps onto status codes.
//!
//! This crate contains no I/O and no async code. It is pure data plus the
//! one-way password hash.
//!
//! ## Key Types
//!
//! - [`Principal`] - An identity record (credentials, tenant, key pair)
//! - [`Item`] - A tenant/owner-scoped record with an optionally sealed payload
//! - [`ItemDraft`] - Free-form caller input split into managed fields and payload
//! - [`ErrorKind`] - The six-way error taxonomy
//!
//! ## Records
//!
//! Records travel as JSON objects ([`Record`]) between the engine and the
//! key store. Field names on the wire are camelCase (`createdBy`, `encPayload`).

pub mod crypto;
pub mod error;
pub mod item;
pub mod principal;

pub use crypto::{hash_password, PasswordHash};
pub use error::{CoreError, ErrorKind, Result};
pub use item::{clean_tags, Item, ItemDraft, MANAGED_FIELDS};
pub use principal::{Principal, ProfileFields};

/// A JSON object as persisted by the key store.
pub type Record = serde_json::Map<String, serde_json::Value>;
