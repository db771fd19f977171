//! # TenantVault Permissions
//!
//! Claims-based access control and payload encryption.
//!
//! ## Overview
//!
//! Every item read, write or delete goes through one rule: the owner
//! (`createdBy`) may do anything, anyone else needs a `group:action` claim
//! matching the item's `groupId`. Items without a group are owner-only.
//!
//! ## Key Concepts
//!
//! - **Claim**: A `group:action` capability, parsed once into a [`ClaimSet`]
//! - **Caller**: The authenticated principal the engine acts for
//! - **SealedPayload**: A payload encrypted to one X25519 public key
//! - **Protect/Reveal**: Sealing and opening an item's payload in place
//!
//! ## Encryption Model
//!
//! Each principal holds one X25519 key pair. Sealing runs an ephemeral
//! agreement with the recipient's public key, derives a ChaCha20-Poly1305 key
//! with BLAKE3, and stores the recipient key in the envelope so that callers
//! holding a different key pair can recognize the payload is not theirs.
//!
//! Private keys are held server-side next to the principal record. This
//! protects data at rest in the key store, not from the service operator.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tenantvault_core::Item;
//! use tenantvault_perms::{
//!     can_access, generate_key_pair, protect, reveal, Action, Caller, ClaimSet, PrincipalKeys,
//! };
//!
//! let pair = generate_key_pair();
//! let owner = Caller::new("u-1", "t-1").with_keys(PrincipalKeys {
//!     public: pair.public,
//!     secret: pair.secret,
//! });
//! let reader = Caller::new("u-2", "t-1").with_claims(ClaimSet::parse(Some("g1:read")));
//!
//! let item = Item {
//!     id: "i-1".into(),
//!     created_by: Some("u-1".into()),
//!     group_id: Some("g1".into()),
//!     payload: Some(serde_json::json!({ "note": "hi" })),
//!     ..Default::default()
//! };
//! assert!(can_access(&reader, &item, Action::Read));
//!
//! let sealed = protect(item, &owner).unwrap();
//! let plain = reveal(sealed, &owner).unwrap();
//! assert!(plain.payload.is_some());
//! ```

pub mod access;
pub mod caller;
pub mod claim;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod protect;

pub use access::{authorize, can_access};
pub use caller::{Caller, PrincipalKeys};
pub use claim::{Action, Claim, ClaimSet};
pub use crypto::{generate_key_pair, KeyPair, X25519PublicKey, X25519StaticSecret};
pub use envelope::{decrypt_asymmetric, encrypt_asymmetric, SealedPayload};
pub use error::{PermsError, Result};
pub use protect::{protect, reveal, reveal_all};
