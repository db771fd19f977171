//! The authenticated caller the data engine acts for.

use tenantvault_core::Principal;

use crate::claim::ClaimSet;
use crate::crypto::{X25519PublicKey, X25519StaticSecret};
use crate::error::Result;

/// A principal's decoded key pair.
#[derive(Debug, Clone)]
pub struct PrincipalKeys {
    pub public: X25519PublicKey,
    pub secret: X25519StaticSecret,
}

impl PrincipalKeys {
    /// Decode the key pair stored on a principal.
    ///
    /// Returns `Ok(None)` when either half is missing. Malformed key material
    /// is an error.
    pub fn from_principal(principal: &Principal) -> Result<Option<Self>> {
        if !principal.has_key_pair() {
            return Ok(None);
        }
        let (Some(public), Some(private)) = (&principal.public_key, &principal.private_key) else {
            return Ok(None);
        };
        Ok(Some(Self {
            public: X25519PublicKey::from_hex(public)?,
            secret: X25519StaticSecret::from_hex(private)?,
        }))
    }
}

/// Who is calling, with what claims and which keys.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub tenant_id: String,
    pub username: Option<String>,
    pub claims: ClaimSet,
    /// Absent keys make protect/reveal pass items through unchanged.
    pub keys: Option<PrincipalKeys>,
}

impl Caller {
    /// A caller without keys or claims.
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            username: None,
            claims: ClaimSet::new(),
            keys: None,
        }
    }

    pub fn with_claims(mut self, claims: ClaimSet) -> Self {
        self.claims = claims;
        self
    }

    pub fn with_keys(mut self, keys: PrincipalKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Build a caller from a stored principal, using the principal's own claims.
    pub fn from_principal(principal: &Principal) -> Result<Self> {
        Ok(Self {
            user_id: principal.user_id.clone(),
            tenant_id: principal.tenant_id.clone().unwrap_or_default(),
            username: principal.username.clone(),
            claims: ClaimSet::parse(principal.claims.as_deref()),
            keys: PrincipalKeys::from_principal(principal)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::Action;
    use crate::crypto::generate_key_pair;
    use crate::error::PermsError;

    #[test]
    fn test_caller_from_principal() {
        let pair = generate_key_pair();
        let mut principal = Principal::new("u-1");
        principal.tenant_id = Some("t-1".into());
        principal.username = Some("alice".into());
        principal.claims = Some("g1:read,g1:write".into());
        principal.public_key = Some(pair.public.to_hex());
        principal.private_key = Some(pair.secret.to_hex());

        let caller = Caller::from_principal(&principal).unwrap();
        assert_eq!(caller.user_id, "u-1");
        assert_eq!(caller.tenant_id, "t-1");
        assert!(caller.claims.allows("g1", Action::Write));
        assert_eq!(caller.keys.unwrap().public, pair.public);
    }

    #[test]
    fn test_missing_keys_are_not_an_error() {
        let mut principal = Principal::new("u-1");
        principal.public_key = Some("aa".into());
        assert!(PrincipalKeys::from_principal(&principal).unwrap().is_none());
    }

    #[test]
    fn test_malformed_keys_are_an_error() {
        let mut principal = Principal::new("u-1");
        principal.public_key = Some("aa".into());
        principal.private_key = Some("bb".into());
        assert!(matches!(
            PrincipalKeys::from_principal(&principal),
            Err(PermsError::InvalidKey(_))
        ));
    }
}
