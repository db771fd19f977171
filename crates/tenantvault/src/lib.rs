//! # TenantVault
//!
//! Multi-tenant data access with claims-based authorization and
//! per-principal payload encryption.
//!
//! ## Overview
//!
//! A request flows through three pieces:
//!
//! - **Authorizer**: verifies the bearer token and emits a cacheable
//!   allow/deny decision carrying the principal context
//! - **Identity**: signup, login and password reset issuing HS256 session
//!   tokens ([`auth::AuthService`])
//! - **Data access**: list/get/create/update/delete over items, enforcing
//!   ownership and `group:action` claims ([`DataAccess`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tenantvault::{Vault, VaultConfig};
//! use tenantvault::auth::{SignupRequest, SigningSecret};
//! use tenantvault::store::SqliteStore;
//!
//! async fn example() -> tenantvault::Result<()> {
//!     let store = Arc::new(SqliteStore::open("vault.db")?);
//!     let secret = SigningSecret::new("change-me")?;
//!     let vault = Vault::new(store, secret, VaultConfig::from_env());
//!
//!     let token = vault
//!         .auth()
//!         .signup(SignupRequest {
//!             username: "alice".into(),
//!             password: "pw".into(),
//!             tenant_id: Some("acme".into()),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let claims = vault.auth().verify_token(&token)?;
//!     let user_id = claims.sub.unwrap_or_default();
//!     let caller = vault.auth().caller(&user_id, Default::default()).await?;
//!
//!     let table = vault.config().table_name(Some("acme"), "notes");
//!     vault.data().create(&table, json!({ "title": "hi" }), &caller).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `tenantvault::core` - Records and the error taxonomy
//! - `tenantvault::store` - Key store adapters
//! - `tenantvault::perms` - Claims, access rule, payload encryption
//! - `tenantvault::auth` - Tokens and the identity service

pub mod authorizer;
pub mod bulk;
pub mod config;
pub mod engine;
pub mod error;

use std::sync::Arc;

use serde_json::Value;

pub use tenantvault_auth as auth;
pub use tenantvault_core as core;
pub use tenantvault_perms as perms;
pub use tenantvault_store as store;

pub use authorizer::{Authorizer, AuthorizerDecision, AuthorizerRequest, Effect};
pub use bulk::{BulkError, BulkReport, BulkSuccess};
pub use config::{EngineConfig, VaultConfig};
pub use engine::{Bucket, DataAccess, ListResults};
pub use error::{Result, VaultError};

pub use tenantvault_core::{ErrorKind, Item, Record};
pub use tenantvault_perms::{Action, Caller, ClaimSet};

use tenantvault_auth::{AuthService, SecretSource, SigningSecret, TableProfileStore};
use tenantvault_store::KeyStore;

/// Everything wired over one key store.
pub struct Vault<S: KeyStore + 'static> {
    config: VaultConfig,
    auth: Arc<AuthService<S>>,
    data: DataAccess<S>,
    authorizer: Authorizer<S>,
}

impl<S: KeyStore + 'static> Vault<S> {
    /// Wire the services over `store`. Profiles are kept in the configured
    /// profile table of the same store.
    pub fn new(store: Arc<S>, secret: SigningSecret, config: VaultConfig) -> Self {
        let profiles = TableProfileStore::new(store.clone(), config.auth.profile_table.clone());
        let auth = Arc::new(
            AuthService::new(store.clone(), secret, config.auth.clone())
                .with_profile_store(Arc::new(profiles)),
        );
        let data = DataAccess::new(store, config.engine.clone());
        let authorizer = Authorizer::new(auth.clone());

        tracing::debug!(env = %config.env, issuer = %config.auth.issuer, "vault initialized");

        Self {
            config,
            auth,
            data,
            authorizer,
        }
    }

    /// Resolve the signing secret from `source`, then wire as [`Vault::new`].
    pub async fn with_secrets(
        store: Arc<S>,
        source: &dyn SecretSource,
        config: VaultConfig,
    ) -> Result<Self> {
        let secret = SigningSecret::resolve(source, &config.auth).await?;
        Ok(Self::new(store, secret, config))
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthService<S> {
        &self.auth
    }

    pub fn data(&self) -> &DataAccess<S> {
        &self.data
    }

    pub fn authorizer(&self) -> &Authorizer<S> {
        &self.authorizer
    }

    /// Rebuild the caller from an authorizer allow context.
    ///
    /// Claims come from the context; keys are loaded from the principal.
    pub async fn caller_from_context(&self, context: &Record) -> Result<Caller> {
        let user_id = context
            .get("userId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VaultError::Unauthorized("no userId in context".into()))?;
        let claims = ClaimSet::parse(context.get("claims").and_then(Value::as_str));

        Ok(self.auth.caller(user_id, claims).await?)
    }
}
