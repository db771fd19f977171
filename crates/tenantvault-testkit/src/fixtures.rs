//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use tenantvault::auth::{SignupRequest, SigningSecret};
use tenantvault::{AuthorizerDecision, AuthorizerRequest, Caller, Vault, VaultConfig};
use tenantvault_core::Record;
use tenantvault_store::MemoryStore;

/// Signing secret shared by every fixture.
pub const TEST_SECRET: &str = "testkit-signing-secret";

/// Item table used by scenario tests.
pub const TEST_TABLE: &str = "acme-notes-dev";

/// API identifier used to build method ARNs.
pub const TEST_API_ARN: &str = "arn:aws:execute-api:us-east-1:123456789012:abcd";

/// A vault over a memory store with a fixed secret.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub vault: Vault<MemoryStore>,
}

/// A principal created through signup.
#[derive(Debug, Clone)]
pub struct SignedUp {
    pub user_id: String,
    pub username: String,
    pub token: String,
}

impl TestFixture {
    /// Create a fixture with the `dev` configuration.
    pub fn new() -> Self {
        Self::with_config(VaultConfig::for_env("dev"))
    }

    /// Create a fixture with a custom configuration.
    pub fn with_config(config: VaultConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let secret = SigningSecret::new(TEST_SECRET).expect("test secret is not empty");
        let vault = Vault::new(store.clone(), secret, config);
        Self { store, vault }
    }

    /// Sign up `username` in tenant `acme`, panicking on failure.
    pub async fn signup(&self, username: &str, password: &str) -> SignedUp {
        let token = self
            .vault
            .auth()
            .signup(SignupRequest {
                username: username.into(),
                password: password.into(),
                tenant_id: Some("acme".into()),
                ..Default::default()
            })
            .await
            .expect("signup failed");
        let claims = self.vault.auth().verify_token(&token).expect("fresh token");

        SignedUp {
            user_id: claims.sub.expect("token has a subject"),
            username: username.into(),
            token,
        }
    }

    /// Replace the stored claims of a principal.
    pub async fn grant(&self, principal: &SignedUp, claims: &str) {
        let mut changes = Record::new();
        changes.insert("claims".into(), claims.into());
        self.vault
            .auth()
            .update_principal(&principal.user_id, changes)
            .await
            .expect("claims update failed");
    }

    /// Run the authorizer for `path` with a bearer token.
    pub async fn authorize(&self, path: &str, token: Option<&str>) -> AuthorizerDecision {
        let mut request = AuthorizerRequest::new(path, method_arn("GET", path));
        if let Some(token) = token {
            request = request.with_header("Authorization", format!("Bearer {}", token));
        }
        self.vault.authorizer().authorize(&request).await
    }

    /// Go through the authorizer and rebuild the caller from its context,
    /// the same way a request handler would.
    pub async fn caller(&self, principal: &SignedUp) -> Caller {
        let decision = self.authorize("/v1/notes", Some(&principal.token)).await;
        assert!(decision.is_allowed(), "authorizer denied {}", principal.username);
        let context = decision.context.unwrap_or_default();
        self.vault
            .caller_from_context(&context)
            .await
            .expect("caller from context")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Method ARN for `verb` on `path` under [`TEST_API_ARN`], stage `v1`.
pub fn method_arn(verb: &str, path: &str) -> String {
    format!("{}/v1/{}{}", TEST_API_ARN, verb, path)
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_signup() {
        let fixture = TestFixture::new();
        let alice = fixture.signup("alice", "pw").await;

        assert!(!alice.user_id.is_empty());
        assert_eq!(fixture.store.len("auth-dev"), 1);
    }

    #[tokio::test]
    async fn test_fixture_caller_carries_keys_and_claims() {
        let fixture = TestFixture::new();
        let alice = fixture.signup("alice", "pw").await;
        fixture.grant(&alice, "g1:read,g2:write").await;

        let caller = fixture.caller(&alice).await;
        assert_eq!(caller.user_id, alice.user_id);
        assert_eq!(caller.tenant_id, "acme");
        assert_eq!(caller.claims.len(), 2);
        assert!(caller.keys.is_some());
    }

    #[test]
    fn test_method_arn() {
        assert_eq!(
            method_arn("GET", "/customer/123"),
            format!("{}/v1/GET/customer/123", TEST_API_ARN)
        );
    }
}
