//! Sealed payload envelope.
//!
//! A payload is sealed to one recipient public key. Each seal runs a fresh
//! ephemeral X25519 agreement, so only the recipient's static secret can open
//! it. The envelope travels as a single base64 string in `encPayload`:
//!
//! ```text
//! version (1) || recipient_pub (32) || ephemeral_pub (32) || nonce (12) || ciphertext
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, SharedKey, X25519PublicKey,
    X25519StaticSecret,
};
use crate::error::{PermsError, Result};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

const HEADER_LEN: usize = 1 + 32 + 32 + 12;

/// A payload sealed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Public key the payload was sealed to.
    pub recipient: X25519PublicKey,

    /// Sender's one-time public key.
    pub ephemeral: X25519PublicKey,

    /// Nonce used for encryption (unique per seal).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// Seal plaintext to `recipient`.
    pub fn seal(plaintext: &[u8], recipient: &X25519PublicKey) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let key = payload_key(&ephemeral.diffie_hellman(recipient), recipient, &ephemeral_public);

        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            recipient: *recipient,
            ephemeral: ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Open with the recipient's static secret.
    pub fn open(&self, secret: &X25519StaticSecret) -> Result<Vec<u8>> {
        if !self.is_sealed_to(&secret.public_key()) {
            return Err(PermsError::DecryptionError(
                "payload is sealed to a different key".into(),
            ));
        }
        let key = payload_key(
            &secret.diffie_hellman(&self.ephemeral),
            &self.recipient,
            &self.ephemeral,
        );
        key.decrypt(&self.ciphertext, &self.nonce)
    }

    /// Whether this payload was sealed to `public`.
    pub fn is_sealed_to(&self, public: &X25519PublicKey) -> bool {
        self.recipient == *public
    }

    /// Serialize to the stored base64 form.
    pub fn to_base64(&self) -> String {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        buf.push(ENVELOPE_VERSION);
        buf.extend_from_slice(self.recipient.as_bytes());
        buf.extend_from_slice(self.ephemeral.as_bytes());
        buf.extend_from_slice(self.nonce.as_bytes());
        buf.extend_from_slice(&self.ciphertext);
        STANDARD.encode(buf)
    }

    /// Parse the stored base64 form.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| PermsError::MalformedEnvelope(e.to_string()))?;

        if bytes.len() <= HEADER_LEN {
            return Err(PermsError::MalformedEnvelope(format!(
                "envelope too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != ENVELOPE_VERSION {
            return Err(PermsError::MalformedEnvelope(format!(
                "unsupported envelope version {}",
                bytes[0]
            )));
        }

        let (recipient, rest) = take::<32>(&bytes[1..]);
        let (ephemeral, rest) = take::<32>(rest);
        let (nonce, ciphertext) = take::<12>(rest);

        Ok(Self {
            recipient: X25519PublicKey::from_bytes(recipient),
            ephemeral: X25519PublicKey::from_bytes(ephemeral),
            nonce: EncryptionNonce::from_bytes(nonce),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Split a fixed-size prefix off a slice already checked to be long enough.
fn take<const N: usize>(bytes: &[u8]) -> ([u8; N], &[u8]) {
    let (head, rest) = bytes.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    (out, rest)
}

fn payload_key(
    shared: &SharedKey,
    recipient: &X25519PublicKey,
    ephemeral: &X25519PublicKey,
) -> EncryptionKey {
    let mut context = [0u8; 64];
    context[..32].copy_from_slice(recipient.as_bytes());
    context[32..].copy_from_slice(ephemeral.as_bytes());
    shared.derive_encryption_key(&context)
}

/// Encrypt a string payload to `public`, returning the envelope string.
pub fn encrypt_asymmetric(public: &X25519PublicKey, plaintext: &str) -> Result<String> {
    Ok(SealedPayload::seal(plaintext.as_bytes(), public)?.to_base64())
}

/// Decrypt an envelope string produced by [`encrypt_asymmetric`].
pub fn decrypt_asymmetric(secret: &X25519StaticSecret, ciphertext: &str) -> Result<String> {
    let plaintext = SealedPayload::from_base64(ciphertext)?.open(secret)?;
    String::from_utf8(plaintext).map_err(|e| PermsError::DecryptionError(e.to_string()))
}
