//! Vault configuration.

use serde::Deserialize;

use tenantvault_auth::AuthConfig;

/// Data engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest input accepted by the bulk operations.
    pub max_bulk_items: usize,
    /// Index on `createdBy` used for the `self` bucket.
    pub owner_index: String,
    /// Index on `groupId` used for claim buckets.
    pub group_index: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_bulk_items: 25,
            owner_index: "createdBy-index".into(),
            group_index: "groupId-index".into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Deployment environment, used as a table-name suffix.
    pub env: String,
    pub auth: AuthConfig,
    pub engine: EngineConfig,
}

impl VaultConfig {
    /// Defaults for `env` (`local` is treated as `dev`).
    pub fn for_env(env: &str) -> Self {
        let env = normalize_env(Some(env));
        Self {
            auth: AuthConfig::for_env(&env),
            engine: EngineConfig::default(),
            env,
        }
    }

    /// Read `AWSENV`, `URL_AUTH`, `URL_UI` and `SECRET_MANAGER_NAME`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::for_env(&normalize_env(lookup("AWSENV").as_deref()));
        if let Some(issuer) = lookup("URL_AUTH").filter(|v| !v.is_empty()) {
            config.auth.issuer = issuer;
        }
        if let Some(ui_url) = lookup("URL_UI").filter(|v| !v.is_empty()) {
            config.auth.ui_url = Some(ui_url);
        }
        if let Some(bundle) = lookup("SECRET_MANAGER_NAME").filter(|v| !v.is_empty()) {
            config.auth.secret_bundle = bundle;
        }
        config
    }

    /// Physical table name: `<tenant>-<name>-<env>`, or `<name>-<env>`.
    pub fn table_name(&self, tenant: Option<&str>, name: &str) -> String {
        match tenant.filter(|t| !t.is_empty()) {
            Some(tenant) => format!("{}-{}-{}", tenant, name, self.env),
            None => format!("{}-{}", name, self.env),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self::for_env("dev")
    }
}

fn normalize_env(env: Option<&str>) -> String {
    match env.map(str::trim) {
        None | Some("") | Some("local") => "dev".into(),
        Some(other) => other.to_string(),
    }
}
