//! # TenantVault Auth
//!
//! Identity and session service: principal records, password checks, and
//! HMAC-signed session tokens.
//!
//! ## Overview
//!
//! - [`AuthService`] - signup, login, forgot/reset password, token issue and verify
//! - [`SigningSecret`] - the server-held HMAC key, resolved from a [`SecretSource`]
//! - [`TokenClaims`] - the `sub`/`aud`/`iat`/`exp`/`iss`/`context` payload
//! - [`ProfileStore`] - the profile record written next to a new principal
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantvault_auth::{AuthConfig, AuthService, SigningSecret, SignupRequest, StaticSecrets};
//! use tenantvault_store::MemoryStore;
//!
//! async fn example() -> tenantvault_auth::Result<()> {
//!     let config = AuthConfig::default();
//!     let secrets = StaticSecrets::new().with_secret(
//!         config.secret_bundle.clone(),
//!         config.signing_secret_name.clone(),
//!         "change-me",
//!     );
//!     let secret = SigningSecret::resolve(&secrets, &config).await?;
//!     let auth = AuthService::new(Arc::new(MemoryStore::new()), secret, config);
//!
//!     let token = auth
//!         .signup(SignupRequest {
//!             username: "alice".into(),
//!             password: "pw".into(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     let claims = auth.verify_token(&token)?;
//!     assert_eq!(claims.context_str("username"), Some("alice"));
//!     Ok(())
//! }
//! ```
//!
//! ## Token Format
//!
//! Tokens are JWS compact strings signed with `HS256` only. `iat` is
//! backdated by the configured clock skew and `exp = iat + lifetime`, where
//! the lifetime is clamped to one second through one day.

pub mod config;
pub mod error;
pub mod profile;
pub mod secrets;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use profile::{ProfileStore, TableProfileStore};
pub use secrets::{SecretSource, SigningSecret, StaticSecrets};
pub use service::{AuthService, LoginRequest, ResetTicket, SignupRequest};
pub use token::{TokenClaims, TokenError};
