//! Gateway authorizer.
//!
//! Turns an inbound request (path, method ARN, headers) into an allow or
//! deny decision. Decisions are cached by the gateway per resource, so the
//! resource is always widened to `<api>/*/*`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tenantvault_auth::AuthService;
use tenantvault_core::Record;
use tenantvault_store::KeyStore;

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Expected token scheme.
pub const BEARER_SCHEME: &str = "bearer";

/// Policy language version of the emitted policy document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Action granted or denied by the policy document.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// The authorizer input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    #[serde(default)]
    pub path: Option<String>,
    pub method_arn: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl AuthorizerRequest {
    pub fn new(path: impl Into<String>, method_arn: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            method_arn: method_arn.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// The authorizer output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerDecision {
    /// The userId on allow, empty otherwise.
    pub principal_id: String,
    pub effect: Effect,
    /// Normalized `<api>/*/*` resource.
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Record>,
}

impl AuthorizerDecision {
    fn allow(principal_id: impl Into<String>, method_arn: &str, context: Record) -> Self {
        Self {
            principal_id: principal_id.into(),
            effect: Effect::Allow,
            resource: normalize_resource(method_arn),
            context: Some(context),
        }
    }

    fn deny(method_arn: &str) -> Self {
        Self {
            principal_id: String::new(),
            effect: Effect::Deny,
            resource: normalize_resource(method_arn),
            context: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }

    /// The gateway policy response shape.
    pub fn to_policy_document(&self) -> Value {
        let mut response = json!({
            "principalId": self.principal_id,
            "policyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Action": INVOKE_ACTION,
                    "Effect": self.effect,
                    "Resource": self.resource,
                }],
            },
        });
        if let (Some(context), Value::Object(fields)) = (&self.context, &mut response) {
            fields.insert("context".into(), Value::Object(context.clone()));
        }
        response
    }
}

/// Widen a method ARN to every stage, verb and path of its API.
///
/// `arn:...:abcd/v1/GET/customer/123` becomes `arn:...:abcd/*/*`.
pub fn normalize_resource(method_arn: &str) -> String {
    let api = method_arn
        .split_once('/')
        .map_or(method_arn, |(api, _)| api);
    format!("{}/*/*", api)
}

/// Whether `path` belongs to the self-authenticating auth flows
/// (`/auth/...` or `/v<n>/auth/...`).
pub fn is_auth_path(path: &str) -> bool {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let mut first = segments.next();
    if let Some(segment) = first {
        let is_version = segment.len() > 1
            && segment.starts_with('v')
            && segment[1..].bytes().all(|b| b.is_ascii_digit());
        if is_version {
            first = segments.next();
        }
    }
    first == Some("auth")
}

/// Pull the token out of an authorization header value.
///
/// `Bearer abc` yields `abc` (scheme matched case-insensitively). A header
/// without the expected scheme is taken as the token itself.
pub fn extract_token(header: &str, scheme: &str) -> Option<String> {
    let header = header.trim();
    let token = match header.split_once(' ') {
        Some((first, rest)) if first.eq_ignore_ascii_case(scheme) => rest.trim(),
        _ => header,
    };
    Some(token.to_string()).filter(|t| !t.is_empty())
}

/// Authorizes gateway requests against the identity service.
pub struct Authorizer<S: KeyStore> {
    auth: Arc<AuthService<S>>,
}

impl<S: KeyStore> Authorizer<S> {
    pub fn new(auth: Arc<AuthService<S>>) -> Self {
        Self { auth }
    }

    /// Decide on `request`. Never fails: every error is a deny.
    pub async fn authorize(&self, request: &AuthorizerRequest) -> AuthorizerDecision {
        let arn = request.method_arn.as_str();

        let Some(path) = request.path.as_deref() else {
            tracing::info!(reason = "missing path", "authorization denied");
            return AuthorizerDecision::deny(arn);
        };
        if is_auth_path(path) {
            let mut context = Record::new();
            context.insert("username".into(), Value::String(String::new()));
            return AuthorizerDecision::allow("", arn, context);
        }

        let Some(token) = request
            .header(AUTHORIZATION_HEADER)
            .and_then(|h| extract_token(h, BEARER_SCHEME))
        else {
            tracing::info!(path, reason = "missing token", "authorization denied");
            return AuthorizerDecision::deny(arn);
        };

        let claims = match self.auth.verify_token(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::info!(path, reason = %e, "authorization denied");
                return AuthorizerDecision::deny(arn);
            }
        };
        let Some(user_id) = claims.sub.as_deref().filter(|s| !s.is_empty()) else {
            tracing::info!(path, reason = "token has no subject", "authorization denied");
            return AuthorizerDecision::deny(arn);
        };

        let principal = match self.auth.principal(user_id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                tracing::info!(path, user_id, reason = "unknown principal", "authorization denied");
                return AuthorizerDecision::deny(arn);
            }
            Err(e) => {
                tracing::warn!(path, user_id, error = %e, "principal lookup failed");
                return AuthorizerDecision::deny(arn);
            }
        };
        let Some(profile) = principal.profile_fields() else {
            tracing::info!(path, user_id, reason = "incomplete principal", "authorization denied");
            return AuthorizerDecision::deny(arn);
        };

        let mut context: Record = claims
            .context
            .iter()
            .filter(|(_, v)| !v.is_object() && !v.is_array())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        context.insert("userId".into(), Value::String(profile.user_id.clone()));
        context.insert("username".into(), Value::String(profile.username));
        context.insert("tenantId".into(), Value::String(profile.tenant_id.clone()));
        context.insert(
            "claims".into(),
            Value::String(profile.claims.unwrap_or_default()),
        );

        tracing::info!(
            path,
            user_id = %profile.user_id,
            tenant_id = %profile.tenant_id,
            "authorization approved"
        );
        AuthorizerDecision::allow(profile.user_id, arn, context)
    }
}
