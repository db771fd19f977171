//! Identity service configuration.

use serde::Deserialize;

/// Configuration for the identity and session service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Fixed `iss` claim written into and required on every token.
    pub issuer: String,
    /// Token lifetime stored on new principals.
    pub default_expiry_secs: i64,
    /// Token lifetime when a principal has no stored preference.
    pub fallback_expiry_secs: i64,
    /// Lifetime of password-reset tokens.
    pub reset_token_ttl_secs: i64,
    /// `iat` is backdated by this much to tolerate clock drift.
    pub clock_skew_secs: i64,
    /// Table holding principal records.
    pub auth_table: String,
    /// Index on `username` in the auth table.
    pub username_index: String,
    /// Table of username reservations, keyed by `username`.
    pub username_table: String,
    /// Table holding profile (customer) records.
    pub profile_table: String,
    /// Secret bundle holding the signing secret.
    pub secret_bundle: String,
    /// Name of the signing secret inside the bundle.
    pub signing_secret_name: String,
    /// Base URL of the UI, used to build password-reset links.
    pub ui_url: Option<String>,
}

impl AuthConfig {
    /// Defaults with table and bundle names suffixed for `env`.
    pub fn for_env(env: &str) -> Self {
        Self {
            issuer: "https://auth.tenantvault.local".into(),
            default_expiry_secs: 3600,
            fallback_expiry_secs: 4 * 60 * 60,
            reset_token_ttl_secs: 20 * 60,
            clock_skew_secs: 30,
            auth_table: format!("auth-{}", env),
            username_index: "username-index".into(),
            username_table: format!("auth-usernames-{}", env),
            profile_table: format!("customer-{}", env),
            secret_bundle: format!("secrets-{}", env),
            signing_secret_name: "jwt-secret".into(),
            ui_url: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_ui_url(mut self, ui_url: impl Into<String>) -> Self {
        self.ui_url = Some(ui_url.into());
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::for_env("dev")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_suffixes() {
        let config = AuthConfig::for_env("prod");
        assert_eq!(config.auth_table, "auth-prod");
        assert_eq!(config.secret_bundle, "secrets-prod");
        assert_eq!(config.profile_table, "customer-prod");
        assert_eq!(config.username_table, "auth-usernames-prod");
        assert_eq!(AuthConfig::default().auth_table, "auth-dev");
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: AuthConfig =
            serde_json::from_str(r#"{ "issuer": "https://auth.example", "clockSkewSecs": 99 }"#)
                .unwrap();
        assert_eq!(config.issuer, "https://auth.example");
        assert_eq!(config.clock_skew_secs, 30);
        assert_eq!(config.reset_token_ttl_secs, 1200);
    }
}
