//! Signing secret retrieval.
//!
//! The HMAC signing secret lives in a named secret bundle held by an external
//! secret manager. It is resolved once and injected into [`AuthService`]
//! rather than looked up per request.
//!
//! [`AuthService`]: crate::AuthService

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

/// Source of named secret bundles.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch a bundle by name. `None` when the bundle does not exist.
    async fn bundle(&self, name: &str) -> Result<Option<HashMap<String, String>>>;
}

/// In-process secret source, for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    bundles: HashMap<String, HashMap<String, String>>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one secret to a bundle.
    pub fn with_secret(
        mut self,
        bundle: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.bundles
            .entry(bundle.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretSource for StaticSecrets {
    async fn bundle(&self, name: &str) -> Result<Option<HashMap<String, String>>> {
        Ok(self.bundles.get(name).cloned())
    }
}

/// The server-held HMAC key for session tokens.
#[derive(Clone)]
pub struct SigningSecret(Arc<[u8]>);

impl SigningSecret {
    /// Wrap raw secret bytes. Empty secrets are rejected.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = secret.as_ref();
        if bytes.is_empty() {
            return Err(AuthError::NotConfigured("signing secret is empty".into()));
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// Look up the secret named by `config` in its bundle.
    pub async fn resolve(source: &dyn SecretSource, config: &AuthConfig) -> Result<Self> {
        let value = source
            .bundle(&config.secret_bundle)
            .await?
            .and_then(|mut bundle| bundle.remove(&config.signing_secret_name))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AuthError::NotConfigured(format!(
                    "the secret {} has not been configured",
                    config.signing_secret_name
                ))
            })?;
        tracing::debug!(bundle = %config.secret_bundle, "resolved signing secret");
        Self::new(value)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_from_bundle() {
        let config = AuthConfig::default();
        let source = StaticSecrets::new().with_secret(
            config.secret_bundle.clone(),
            config.signing_secret_name.clone(),
            "s3cret",
        );

        let secret = SigningSecret::resolve(&source, &config).await.unwrap();
        assert_eq!(secret.as_bytes(), b"s3cret");
        assert_eq!(format!("{:?}", secret), "SigningSecret(<redacted>)");
    }

    #[tokio::test]
    async fn test_resolve_missing_secret() {
        let config = AuthConfig::default();

        let empty = StaticSecrets::new();
        let err = SigningSecret::resolve(&empty, &config).await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured(_)));

        let wrong_name = StaticSecrets::new().with_secret(config.secret_bundle.clone(), "other", "x");
        assert!(SigningSecret::resolve(&wrong_name, &config).await.is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(SigningSecret::new("").is_err());
    }
}
