//! The identity and session service.
//!
//! Owns principal records. Signup, login and password reset all end in a
//! freshly issued session token; the gateway authorizer and the data engine
//! only ever read principals back.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tenantvault_core::principal::clamp_expiry;
use tenantvault_core::{hash_password, Principal, Record};
use tenantvault_perms::{generate_key_pair, Caller, ClaimSet};
use tenantvault_store::{IndexQuery, KeyStore, RecordKey};

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::profile::ProfileStore;
use crate::secrets::SigningSecret;
use crate::token::{self, TokenClaims};

/// Tenant assigned when signup does not name one.
pub const DEFAULT_TENANT: &str = "default";

/// `context.purpose` carried by password-reset tokens.
pub const RESET_PURPOSE: &str = "password-reset";

const INVALID_CREDENTIALS: &str = "Username or password is invalid";

/// Principal attributes that only dedicated flows may change.
const PROTECTED_ATTRIBUTES: &[&str] = &["userId", "passwordHash", "password", "publicKey", "privateKey"];

/// Input to [`AuthService::signup`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub expiry_in_sec: Option<i64>,
    #[serde(default)]
    pub claims: Option<String>,
    #[serde(default)]
    pub context: Record,
    /// Profile record to create next to the principal.
    #[serde(default)]
    pub profile: Option<Record>,
}

/// Input to [`AuthService::login`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Overrides the principal's stored token lifetime.
    #[serde(default)]
    pub expiry_in_sec: Option<i64>,
}

/// Result of [`AuthService::forgot_password`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTicket {
    pub token: String,
    /// Reset link, when a UI URL is configured.
    pub url: Option<String>,
}

/// Identity and session service over a key store.
pub struct AuthService<S: KeyStore> {
    store: Arc<S>,
    secret: SigningSecret,
    config: AuthConfig,
    profiles: Option<Arc<dyn ProfileStore>>,
}

impl<S: KeyStore> AuthService<S> {
    /// Create a service signing with `secret`.
    pub fn new(store: Arc<S>, secret: SigningSecret, config: AuthConfig) -> Self {
        Self {
            store,
            secret,
            config,
            profiles: None,
        }
    }

    /// Create profile records at signup through `profiles`.
    pub fn with_profile_store(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Flows
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a principal and issue its first token.
    ///
    /// The username is reserved with a conditional write first, so two
    /// concurrent signups for one name cannot both succeed. The principal
    /// and the optional profile are then written one after the other. A
    /// failed profile write leaves the principal in place.
    pub async fn signup(&self, request: SignupRequest) -> Result<String> {
        let username = request.username.trim();
        if username.is_empty() || request.password.is_empty() {
            return Err(AuthError::BadRequest(
                "username and password are required".into(),
            ));
        }

        if self.principal_by_username(username).await?.is_some() {
            tracing::info!(username, "signup rejected, username taken");
            return Err(AuthError::Conflict(format!(
                "username {} is already registered",
                username
            )));
        }

        let tenant_id = request
            .tenant_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TENANT.to_string());
        let keys = generate_key_pair();

        let mut principal = Principal::new(Uuid::new_v4().to_string());
        if !self.reserve_username(username, &principal.user_id).await? {
            tracing::info!(username, "signup rejected, username reserved concurrently");
            return Err(AuthError::Conflict(format!(
                "username {} is already registered",
                username
            )));
        }
        principal.username = Some(username.to_string());
        principal.password_hash = Some(hash_password(&request.password));
        principal.tenant_id = Some(tenant_id.clone());
        principal.expiry_in_sec = Some(clamp_expiry(
            request.expiry_in_sec.unwrap_or(self.config.default_expiry_secs),
        ));
        principal.public_key = Some(keys.public.to_hex());
        principal.private_key = Some(keys.secret.to_hex());
        principal.claims = request.claims.filter(|c| !c.trim().is_empty());
        principal.context = request.context;

        let key = principal_key(&principal.user_id);
        if !self
            .store
            .insert(&self.config.auth_table, &key, principal.to_record()?)
            .await?
        {
            self.release_username(username, &principal.user_id).await?;
            return Err(AuthError::Conflict(format!(
                "user id {} already exists",
                principal.user_id
            )));
        }
        tracing::info!(user_id = %principal.user_id, %tenant_id, "principal created");

        if let (Some(profiles), Some(profile)) = (&self.profiles, request.profile) {
            if let Err(e) = profiles.create_profile(&tenant_id, profile).await {
                tracing::warn!(
                    user_id = %principal.user_id,
                    error = %e,
                    "profile creation failed after principal was created"
                );
                return Err(AuthError::BadRequest(format!("profile creation failed: {}", e)));
            }
        }

        self.issue_token(&principal, None)
    }

    /// Check credentials and issue a token.
    pub async fn login(&self, request: LoginRequest) -> Result<String> {
        let principal = match self.principal_by_username(request.username.trim()).await? {
            Some(p) if p.password_hash.as_ref().map_or(false, |h| h.matches(&request.password)) => p,
            _ => {
                tracing::info!(username = %request.username, "login rejected");
                return Err(AuthError::Unauthorized(INVALID_CREDENTIALS.into()));
            }
        };
        ensure_tenant(&principal)?;

        tracing::info!(user_id = %principal.user_id, "login succeeded");
        self.issue_token(&principal, request.expiry_in_sec)
    }

    /// Issue a short-lived password-reset token.
    ///
    /// Unknown usernames get the same generic error as any other failure.
    pub async fn forgot_password(&self, username: &str) -> Result<ResetTicket> {
        let Some(principal) = self.principal_by_username(username.trim()).await? else {
            tracing::info!(username, "password reset requested for unknown user");
            return Err(AuthError::Unauthorized("unable to reset password".into()));
        };

        let mut context = Record::new();
        context.insert("username".into(), Value::String(username.trim().to_string()));
        context.insert("purpose".into(), Value::String(RESET_PURPOSE.into()));

        let now = chrono::Utc::now().timestamp();
        let iat = now - self.config.clock_skew_secs;
        let claims = TokenClaims {
            sub: Some(principal.user_id.clone()),
            aud: None,
            iat,
            exp: iat + self.config.reset_token_ttl_secs,
            iss: self.config.issuer.clone(),
            context,
        };
        let token = token::sign(&claims, &self.secret)?;

        let url = self.config.ui_url.as_deref().map(|base| {
            format!("{}/reset-password?token={}", base.trim_end_matches('/'), token)
        });
        tracing::info!(user_id = %principal.user_id, "password reset token issued");
        Ok(ResetTicket { token, url })
    }

    /// Replace the password named by a reset token and log in again.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<String> {
        let claims = self.verify_token(reset_token)?;
        if claims.context_str("purpose") != Some(RESET_PURPOSE) {
            return Err(AuthError::Unauthorized("not a password reset token".into()));
        }
        let Some(username) = claims.context_str("username").filter(|u| !u.is_empty()) else {
            return Err(AuthError::Unauthorized("reset token has no username".into()));
        };
        if new_password.is_empty() {
            return Err(AuthError::BadRequest("new password is required".into()));
        }

        let principal = match self.principal_by_username(username).await? {
            Some(p) if claims.sub.as_deref() == Some(p.user_id.as_str()) => p,
            _ => return Err(AuthError::Unauthorized("unable to reset password".into())),
        };

        let mut changes = Record::new();
        changes.insert(
            "passwordHash".into(),
            Value::String(hash_password(new_password).as_str().to_string()),
        );
        let updated = self
            .store
            .update(&self.config.auth_table, &principal_key(&principal.user_id), changes)
            .await?;
        let principal = Principal::from_record(updated)?;
        ensure_tenant(&principal)?;

        tracing::info!(user_id = %principal.user_id, "password reset");
        self.issue_token(&principal, None)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a token for `principal`, valid from now.
    pub fn issue_token(&self, principal: &Principal, expiry_secs: Option<i64>) -> Result<String> {
        self.issue_token_at(principal, expiry_secs, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    ///
    /// Lifetime is the clamped `expiry_secs`, else the principal's stored
    /// preference, else the configured fallback.
    pub fn issue_token_at(
        &self,
        principal: &Principal,
        expiry_secs: Option<i64>,
        now: i64,
    ) -> Result<String> {
        let lifetime = expiry_secs
            .map(clamp_expiry)
            .or_else(|| principal.preferred_expiry())
            .unwrap_or(self.config.fallback_expiry_secs);

        let mut context = principal.context.clone();
        if let Some(username) = &principal.username {
            context.insert("username".into(), Value::String(username.clone()));
        }

        let iat = now - self.config.clock_skew_secs;
        let claims = TokenClaims {
            sub: Some(principal.user_id.clone()),
            aud: principal.tenant_id.clone(),
            iat,
            exp: iat + lifetime,
            iss: self.config.issuer.clone(),
            context,
        };
        Ok(token::sign(&claims, &self.secret)?)
    }

    /// Verify a token against the current time.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims> {
        self.verify_token_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a token as if the current time were `now` (Unix seconds).
    pub fn verify_token_at(&self, token: &str, now: i64) -> Result<TokenClaims> {
        Ok(token::verify(token, &self.secret, &self.config.issuer, now)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principals
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a principal by userId.
    pub async fn principal(&self, user_id: &str) -> Result<Option<Principal>> {
        self.store
            .get(&self.config.auth_table, &principal_key(user_id))
            .await?
            .map(Principal::from_record)
            .transpose()
            .map_err(AuthError::from)
    }

    /// Look up a principal through the username index.
    pub async fn principal_by_username(&self, username: &str) -> Result<Option<Principal>> {
        if username.is_empty() {
            return Ok(None);
        }
        let query = IndexQuery::eq(self.config.username_index.clone(), "username", username);
        let found = self.store.query_index(&self.config.auth_table, &query).await?;
        if found.len() > 1 {
            tracing::warn!(username, count = found.len(), "username index holds duplicates");
        }
        found
            .into_iter()
            .next()
            .map(Principal::from_record)
            .transpose()
            .map_err(AuthError::from)
    }

    /// Every principal in the auth table.
    pub async fn list_principals(&self) -> Result<Vec<Principal>> {
        self.store
            .scan(&self.config.auth_table, &Record::new())
            .await?
            .into_iter()
            .map(|r| Principal::from_record(r).map_err(AuthError::from))
            .collect()
    }

    /// Apply attribute changes to a principal.
    ///
    /// Identity, password and key attributes are ignored here. A new
    /// username is reserved before the write and the old one released after.
    pub async fn update_principal(&self, user_id: &str, mut changes: Record) -> Result<Principal> {
        for attribute in PROTECTED_ATTRIBUTES {
            changes.remove(*attribute);
        }

        let Some(current) = self.principal(user_id).await? else {
            return Err(AuthError::NotFound(format!("principal {}", user_id)));
        };

        let renamed_to = match changes.get("username").cloned() {
            None => None,
            Some(value) => {
                let Some(username) = value.as_str().map(str::trim).filter(|u| !u.is_empty()) else {
                    return Err(AuthError::BadRequest("username must be a non-empty string".into()));
                };
                let taken_by_other = self
                    .principal_by_username(username)
                    .await?
                    .map_or(false, |owner| owner.user_id != user_id);
                if taken_by_other || !self.reserve_username(username, user_id).await? {
                    return Err(AuthError::Conflict(format!(
                        "username {} is already registered",
                        username
                    )));
                }
                changes.insert("username".into(), Value::String(username.to_string()));
                Some(username.to_string())
            }
        };

        let updated = match self
            .store
            .update(&self.config.auth_table, &principal_key(user_id), changes)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(new_name) = renamed_to.as_deref() {
                    if current.username.as_deref() != Some(new_name) {
                        self.release_username(new_name, user_id).await?;
                    }
                }
                return Err(e.into());
            }
        };

        if let (Some(old), Some(new_name)) = (current.username.as_deref(), renamed_to.as_deref()) {
            if old != new_name {
                self.release_username(old, user_id).await?;
            }
        }
        Ok(Principal::from_record(updated)?)
    }

    /// Remove a principal. Missing principals are not an error.
    pub async fn delete_principal(&self, user_id: &str) -> Result<()> {
        let existing = self.principal(user_id).await?;
        self.store
            .delete(&self.config.auth_table, &principal_key(user_id))
            .await?;
        if let Some(username) = existing.as_ref().and_then(|p| p.username.as_deref()) {
            self.release_username(username, user_id).await?;
        }
        tracing::info!(user_id, "principal deleted");
        Ok(())
    }

    /// Build the data-engine caller for `user_id` with the given claims.
    pub async fn caller(&self, user_id: &str, claims: ClaimSet) -> Result<Caller> {
        let principal = self
            .principal(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("principal {}", user_id)))?;
        Ok(Caller::from_principal(&principal)?.with_claims(claims))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Username reservations
    // ─────────────────────────────────────────────────────────────────────────

    /// Claim `username` for `user_id`. Returns `false` when another
    /// principal holds it; holding it already counts as success.
    async fn reserve_username(&self, username: &str, user_id: &str) -> Result<bool> {
        let table = &self.config.username_table;
        let key = username_key(username);

        let mut reservation = Record::new();
        reservation.insert("userId".into(), Value::String(user_id.to_string()));
        if self.store.insert(table, &key, reservation).await? {
            return Ok(true);
        }

        let holder = self.store.get(table, &key).await?;
        Ok(holder
            .as_ref()
            .and_then(|r| r.get("userId"))
            .and_then(Value::as_str)
            == Some(user_id))
    }

    /// Drop the reservation of `username` if `user_id` holds it.
    async fn release_username(&self, username: &str, user_id: &str) -> Result<()> {
        let table = &self.config.username_table;
        let key = username_key(username);
        let held = self
            .store
            .get(table, &key)
            .await?
            .as_ref()
            .and_then(|r| r.get("userId"))
            .and_then(Value::as_str)
            .map_or(false, |holder| holder == user_id);
        if held {
            self.store.delete(table, &key).await?;
        }
        Ok(())
    }
}

fn principal_key(user_id: &str) -> RecordKey {
    RecordKey::new("userId", user_id)
}

fn username_key(username: &str) -> RecordKey {
    RecordKey::new("username", username)
}

fn ensure_tenant(principal: &Principal) -> Result<()> {
    match principal.tenant_id.as_deref() {
        Some(t) if !t.is_empty() => Ok(()),
        _ => Err(AuthError::NotConfigured(format!(
            "the user {} has not been configured",
            principal.username.as_deref().unwrap_or(&principal.user_id)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::TableProfileStore;
    use crate::token::TokenError;
    use serde_json::json;
    use tenantvault_core::ErrorKind;
    use tenantvault_store::{MemoryStore, SqliteStore};

    fn service() -> AuthService<MemoryStore> {
        AuthService::new(
            Arc::new(MemoryStore::new()),
            SigningSecret::new("test-secret").unwrap(),
            AuthConfig::default().with_ui_url("https://ui.test/"),
        )
    }

    fn signup_request(username: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            password: password.into(),
            tenant_id: Some("t-1".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_signup_issues_token_and_stores_principal() {
        let auth = service();
        let token = auth.signup(signup_request("alice", "pw1")).await.unwrap();

        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.aud.as_deref(), Some("t-1"));
        assert_eq!(claims.context_str("username"), Some("alice"));
        assert_eq!(claims.exp - claims.iat, 3600);

        let stored = auth.principal_by_username("alice").await.unwrap().unwrap();
        assert_eq!(claims.sub.as_deref(), Some(stored.user_id.as_str()));
        assert!(stored.has_key_pair());
        assert_eq!(stored.password_hash, Some(hash_password("pw1")));
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts_without_mutation() {
        let auth = service();
        auth.signup(signup_request("alice", "pw1")).await.unwrap();
        let before = auth.principal_by_username("alice").await.unwrap().unwrap();

        let err = auth.signup(signup_request("alice", "pw2")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after = auth.principal_by_username("alice").await.unwrap().unwrap();
        assert_eq!(after.user_id, before.user_id);
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(auth.list_principals().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_signup_defaults_and_validation() {
        let auth = service();
        let token = auth
            .signup(SignupRequest {
                username: "bob".into(),
                password: "pw".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(auth.verify_token(&token).unwrap().aud.as_deref(), Some(DEFAULT_TENANT));

        let err = auth.signup(signup_request("  ", "pw")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        let err = auth.signup(signup_request("carol", "")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_signup_profile_failure_keeps_principal() {
        let store = Arc::new(MemoryStore::new());
        let config = AuthConfig::default();
        let profiles = Arc::new(TableProfileStore::new(store.clone(), config.profile_table.clone()));
        let auth = AuthService::new(store, SigningSecret::new("s").unwrap(), config)
            .with_profile_store(profiles.clone());

        let mut request = signup_request("alice", "pw");
        request.profile = Some(json!({ "id": "c-1", "firstName": "Ada" }).as_object().cloned().unwrap());
        auth.signup(request).await.unwrap();
        assert!(profiles.profile("t-1", "c-1").await.unwrap().is_some());

        // Same profile id again: the principal is written, the profile is not.
        let mut request = signup_request("bob", "pw");
        request.profile = Some(json!({ "id": "c-1" }).as_object().cloned().unwrap());
        let err = auth.signup(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(auth.principal_by_username("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login() {
        let auth = service();
        auth.signup(signup_request("alice", "pw1")).await.unwrap();

        let token = auth
            .login(LoginRequest {
                username: "alice".into(),
                password: "pw1".into(),
                expiry_in_sec: Some(10_000_000),
            })
            .await
            .unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 86_400);

        for (username, password) in [("alice", "wrong"), ("nobody", "pw1")] {
            let err = auth
                .login(LoginRequest {
                    username: username.into(),
                    password: password.into(),
                    expiry_in_sec: None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
            assert!(err.to_string().contains(INVALID_CREDENTIALS));
        }
    }

    #[tokio::test]
    async fn test_login_without_tenant_is_internal() {
        let auth = service();
        auth.signup(signup_request("alice", "pw")).await.unwrap();
        let principal = auth.principal_by_username("alice").await.unwrap().unwrap();

        let mut changes = Record::new();
        changes.insert("tenantId".into(), Value::Null);
        auth.update_principal(&principal.user_id, changes).await.unwrap();

        let err = auth
            .login(LoginRequest {
                username: "alice".into(),
                password: "pw".into(),
                expiry_in_sec: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let auth = service();
        auth.signup(signup_request("alice", "old")).await.unwrap();

        let ticket = auth.forgot_password("alice").await.unwrap();
        let claims = auth.verify_token(&ticket.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 1200);
        assert_eq!(claims.aud, None);
        assert_eq!(
            ticket.url,
            Some(format!("https://ui.test/reset-password?token={}", ticket.token))
        );

        let token = auth.reset_password(&ticket.token, "new").await.unwrap();
        assert_eq!(auth.verify_token(&token).unwrap().aud.as_deref(), Some("t-1"));

        let login = |password: &str| LoginRequest {
            username: "alice".into(),
            password: password.into(),
            expiry_in_sec: None,
        };
        assert!(auth.login(login("old")).await.is_err());
        assert!(auth.login(login("new")).await.is_ok());

        let err = auth.forgot_password("nobody").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_reset_requires_reset_token() {
        let auth = service();
        let session = auth.signup(signup_request("alice", "pw")).await.unwrap();

        let err = auth.reset_password(&session, "new").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = auth.reset_password("garbage", "new").await.unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Malformed(_))));
    }

    #[test]
    fn test_issue_token_lifetimes() {
        let auth = service();
        let now = 1_700_000_000;
        let mut principal = Principal::new("u-1");
        principal.tenant_id = Some("t-1".into());

        // No preference: fallback of four hours.
        let claims = auth
            .verify_token_at(&auth.issue_token_at(&principal, None, now).unwrap(), now)
            .unwrap();
        assert_eq!(claims.iat, now - 30);
        assert_eq!(claims.exp, now - 30 + 14_400);

        principal.expiry_in_sec = Some(600);
        let claims = auth
            .verify_token_at(&auth.issue_token_at(&principal, None, now).unwrap(), now)
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 600);

        let claims = auth
            .verify_token_at(&auth.issue_token_at(&principal, Some(0), now).unwrap(), now - 30)
            .unwrap();
        assert_eq!(claims.exp - claims.iat, 1);

        let token = auth.issue_token_at(&principal, Some(60), now).unwrap();
        assert!(matches!(
            auth.verify_token_at(&token, now + 31),
            Err(AuthError::Token(TokenError::Expired { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_principal_protects_secrets() {
        let auth = service();
        auth.signup(signup_request("alice", "pw")).await.unwrap();
        auth.signup(signup_request("bob", "pw")).await.unwrap();
        let alice = auth.principal_by_username("alice").await.unwrap().unwrap();

        let changes = json!({
            "userId": "hijack",
            "passwordHash": "0000",
            "privateKey": "00",
            "claims": "g1:read",
        });
        let updated = auth
            .update_principal(&alice.user_id, changes.as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(updated.user_id, alice.user_id);
        assert_eq!(updated.password_hash, alice.password_hash);
        assert_eq!(updated.private_key, alice.private_key);
        assert_eq!(updated.claims.as_deref(), Some("g1:read"));

        let rename = json!({ "username": "bob" }).as_object().cloned().unwrap();
        let err = auth.update_principal(&alice.user_id, rename).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = auth.update_principal("missing", Record::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_caller_and_delete() {
        let auth = service();
        auth.signup(signup_request("alice", "pw")).await.unwrap();
        let alice = auth.principal_by_username("alice").await.unwrap().unwrap();

        let caller = auth
            .caller(&alice.user_id, ClaimSet::parse(Some("g1:read")))
            .await
            .unwrap();
        assert_eq!(caller.tenant_id, "t-1");
        assert!(caller.keys.is_some());
        assert_eq!(caller.claims, ClaimSet::parse(Some("g1:read")));

        auth.delete_principal(&alice.user_id).await.unwrap();
        assert!(auth.principal(&alice.user_id).await.unwrap().is_none());
        assert_eq!(
            auth.caller(&alice.user_id, ClaimSet::new()).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signups_keep_usernames_unique() {
        let auth = Arc::new(AuthService::new(
            Arc::new(SqliteStore::open_memory().unwrap()),
            SigningSecret::new("test-secret").unwrap(),
            AuthConfig::default(),
        ));

        for round in 0..50 {
            let username = format!("user{}", round);
            let first = tokio::spawn({
                let auth = auth.clone();
                let request = signup_request(&username, "pw");
                async move { auth.signup(request).await }
            });
            let second = tokio::spawn({
                let auth = auth.clone();
                let request = signup_request(&username, "pw");
                async move { auth.signup(request).await }
            });
            let results = [first.await.unwrap(), second.await.unwrap()];

            let ok = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(ok, 1, "round {}", round);
            let err = results.into_iter().find_map(|r| r.err()).unwrap();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }

        assert_eq!(auth.list_principals().await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_rename_and_delete_release_usernames() {
        let auth = service();
        auth.signup(signup_request("alice", "pw")).await.unwrap();
        let alice = auth.principal_by_username("alice").await.unwrap().unwrap();

        let rename = json!({ "username": " alicia " }).as_object().cloned().unwrap();
        let renamed = auth.update_principal(&alice.user_id, rename).await.unwrap();
        assert_eq!(renamed.username.as_deref(), Some("alicia"));

        // Renaming to the name already held is a no-op, not a conflict.
        let same = json!({ "username": "alicia" }).as_object().cloned().unwrap();
        auth.update_principal(&alice.user_id, same).await.unwrap();

        // The old name is free again; the new one is taken.
        auth.signup(signup_request("alice", "pw")).await.unwrap();
        let err = auth.signup(signup_request("alicia", "pw")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        auth.delete_principal(&alice.user_id).await.unwrap();
        auth.signup(signup_request("alicia", "pw")).await.unwrap();
        assert_eq!(auth.list_principals().await.unwrap().len(), 2);
    }
}
