//! Session tokens.
//!
//! Tokens are compact JWS strings (`header.payload.signature`, each part
//! base64url without padding) signed with HMAC-SHA256 under the server-held
//! secret. Only `HS256` is accepted; per-user X25519 keys never sign tokens.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use tenantvault_core::Record;

use crate::secrets::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// The only accepted signing algorithm.
pub const ALGORITHM: &str = "HS256";

/// Reasons a token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signature")]
    BadSignature,

    #[error("wrong issuer: expected {expected}, found {found}")]
    WrongIssuer { expected: String, found: String },

    #[error("token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// The signed token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the principal's userId.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience: the principal's tenantId.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    pub iat: i64,
    pub exp: i64,
    pub iss: String,

    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub context: Record,
}

impl TokenClaims {
    /// A string value from the context map.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|v| v.as_str())
    }
}

/// Sign `claims` into a compact token.
pub fn sign(claims: &TokenClaims, secret: &SigningSecret) -> Result<String, TokenError> {
    let header = Header {
        alg: ALGORITHM.into(),
        typ: Some("JWT".into()),
    };
    let header = encode_part(&header)?;
    let payload = encode_part(claims)?;
    let signing_input = format!("{}.{}", header, payload);

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Verify signature, expiry and issuer, returning the payload.
pub fn verify(
    token: &str,
    secret: &SigningSecret,
    issuer: &str,
    now: i64,
) -> Result<TokenClaims, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three segments".into()));
    };

    let decoded_header: Header = decode_part(header)?;
    if decoded_header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm(decoded_header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| TokenError::Malformed(format!("signature: {}", e)))?;
    let mut mac = mac(secret)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: TokenClaims = decode_part(payload)?;
    if now >= claims.exp {
        return Err(TokenError::Expired {
            exp: claims.exp,
            now,
        });
    }
    if claims.iss != issuer {
        return Err(TokenError::WrongIssuer {
            expected: issuer.to_string(),
            found: claims.iss,
        });
    }

    Ok(claims)
}

fn mac(secret: &SigningSecret) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TokenError::Malformed(format!("signing key: {}", e)))
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
}

impl fmt::Display for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sub={} aud={} exp={}",
            self.sub.as_deref().unwrap_or("-"),
            self.aud.as_deref().unwrap_or("-"),
            self.exp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ISSUER: &str = "https://auth.test";
    const NOW: i64 = 1_700_000_000;

    fn secret() -> SigningSecret {
        SigningSecret::new("test-secret").unwrap()
    }

    fn claims() -> TokenClaims {
        let mut context = Record::new();
        context.insert("username".into(), json!("alice"));
        TokenClaims {
            sub: Some("u-1".into()),
            aud: Some("t-1".into()),
            iat: NOW - 30,
            exp: NOW + 3600,
            iss: ISSUER.into(),
            context,
        }
    }

    /// Re-sign arbitrary header and payload JSON with the test secret.
    fn forge(header: serde_json::Value, payload: &TokenClaims) -> String {
        let header = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload = encode_part(payload).unwrap();
        let mut mac = mac(&secret()).unwrap();
        mac.update(format!("{}.{}", header, payload).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}.{}", header, payload, signature)
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let token = sign(&claims(), &secret()).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let verified = verify(&token, &secret(), ISSUER, NOW).unwrap();
        assert_eq!(verified, claims());
        assert_eq!(verified.context_str("username"), Some("alice"));
    }

    #[test]
    fn test_rejects_wrong_issuer() {
        let token = sign(&claims(), &secret()).unwrap();
        assert!(matches!(
            verify(&token, &secret(), "https://evil.test", NOW),
            Err(TokenError::WrongIssuer { .. })
        ));
    }

    #[test]
    fn test_rejects_other_algorithms() {
        for alg in ["none", "HS512", "RS256", "hs256"] {
            let token = forge(json!({ "alg": alg, "typ": "JWT" }), &claims());
            assert_eq!(
                verify(&token, &secret(), ISSUER, NOW),
                Err(TokenError::UnsupportedAlgorithm(alg.into()))
            );
        }

        // Same header shape with HS256 passes, so only the algorithm was at fault.
        let token = forge(json!({ "alg": "HS256" }), &claims());
        assert!(verify(&token, &secret(), ISSUER, NOW).is_ok());
    }

    #[test]
    fn test_rejects_expired() {
        let token = sign(&claims(), &secret()).unwrap();
        assert!(verify(&token, &secret(), ISSUER, NOW + 3599).is_ok());
        assert_eq!(
            verify(&token, &secret(), ISSUER, NOW + 3600),
            Err(TokenError::Expired {
                exp: NOW + 3600,
                now: NOW + 3600
            })
        );
    }

    #[test]
    fn test_rejects_tampered_signature() {
        let token = sign(&claims(), &secret()).unwrap();

        let other_secret = SigningSecret::new("other-secret").unwrap();
        assert_eq!(
            verify(&token, &other_secret, ISSUER, NOW),
            Err(TokenError::BadSignature)
        );

        // Swap in a payload for another subject, keeping the old signature.
        let mut forged = claims();
        forged.sub = Some("u-2".into());
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], encode_part(&forged).unwrap(), parts[2]);
        assert_eq!(
            verify(&tampered, &secret(), ISSUER, NOW),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(verify(token, &secret(), ISSUER, NOW), Err(TokenError::Malformed(_))),
                "token {:?}",
                token
            );
        }
    }
}
