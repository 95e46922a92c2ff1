//! QR admission token codec
//!
//! A token is URL-safe base64 (no padding) of:
//!
//! ```text
//! [version: 1 byte][nonce: 12 bytes][AES-256-GCM ciphertext + tag]
//! ```
//!
//! The plaintext is the JSON object `{"ticket_id": "..."}`. The version byte is
//! bound to the ciphertext as associated data.
//!
//! The nonce is derived from the key and the ticket ID, so encoding is a pure
//! function: one ticket ID has exactly one token, and a token decodes to
//! exactly one ticket ID. Decoding rejects any token whose nonce does not match
//! the derivation for the ID it carries. Tokens never carry check-in state.

use crate::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Current token layout version
const TOKEN_VERSION: u8 = 0x01;

/// AES-GCM nonce length (96 bits)
const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
const TAG_LEN: usize = 16;

/// Required key length for AES-256
pub const KEY_LEN: usize = 32;

/// Domain separation label for nonce derivation
const NONCE_LABEL: &[u8] = b"admit.qr.nonce.v1";

#[derive(Debug, Serialize, Deserialize)]
struct QrPayload {
    ticket_id: String,
}

/// Symmetric, authenticated encoder/decoder for admission tokens
///
/// Cheap to clone; the cipher is shared read-only between clones.
#[derive(Clone)]
pub struct QrCodec {
    cipher: Arc<Aes256Gcm>,
    nonce_seed: [u8; 32],
}

impl std::fmt::Debug for QrCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrCodec").finish_non_exhaustive()
    }
}

impl QrCodec {
    /// Build a codec from raw key bytes (must be exactly 32 bytes)
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(Error::Config(format!(
                "QR secret must be exactly {} bytes for AES-256-GCM, got {}",
                KEY_LEN,
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| Error::Config(format!("Failed to initialize AES-256-GCM cipher: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(NONCE_LABEL);
        hasher.update(key);
        let nonce_seed: [u8; 32] = hasher.finalize().into();

        Ok(Self {
            cipher: Arc::new(cipher),
            nonce_seed,
        })
    }

    /// Build a codec from a standard base64-encoded 32-byte key
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Config(format!("QR secret is not valid base64: {}", e)))?;
        Self::new(&key)
    }

    /// Generate a fresh random key, base64-encoded for configuration files
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    fn derive_nonce(&self, ticket_id: &str) -> [u8; NONCE_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(self.nonce_seed);
        hasher.update(ticket_id.as_bytes());
        let digest = hasher.finalize();

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }

    /// Encode a ticket ID into an opaque QR token
    pub fn encode(&self, ticket_id: &str) -> Result<String> {
        let plaintext = serde_json::to_vec(&QrPayload {
            ticket_id: ticket_id.to_string(),
        })
        .map_err(|e| Error::Internal(format!("Failed to serialize QR payload: {}", e)))?;

        let nonce_bytes = self.derive_nonce(ticket_id);
        let aad = [TOKEN_VERSION];
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| Error::Internal(format!("Encryption failed: {}", e)))?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        raw.push(TOKEN_VERSION);
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decode a QR token back to its ticket ID
    ///
    /// Fails with [`Error::InvalidToken`] when the token is malformed, fails
    /// authentication, or does not carry a ticket ID.
    pub fn decode(&self, token: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| Error::InvalidToken)?;

        if raw.len() < 1 + NONCE_LEN + TAG_LEN || raw[0] != TOKEN_VERSION {
            return Err(Error::InvalidToken);
        }

        let (nonce_bytes, ciphertext) = raw[1..].split_at(NONCE_LEN);
        let aad = [TOKEN_VERSION];
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::InvalidToken)?;

        let payload: QrPayload =
            serde_json::from_slice(&plaintext).map_err(|_| Error::InvalidToken)?;

        if payload.ticket_id.is_empty() || &self.derive_nonce(&payload.ticket_id)[..] != nonce_bytes {
            return Err(Error::InvalidToken);
        }

        Ok(payload.ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> QrCodec {
        QrCodec::new(&[7u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        for id in ["NACOS-8F3A2C9D", "NACOS-00000000", "x", "ticket with spaces"] {
            let token = codec.encode(id).unwrap();
            assert_eq!(codec.decode(&token).unwrap(), id);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = codec();
        assert_eq!(
            codec.encode("NACOS-1").unwrap(),
            codec.encode("NACOS-1").unwrap()
        );
    }

    #[test]
    fn test_distinct_ids_distinct_tokens() {
        let codec = codec();
        assert_ne!(
            codec.encode("NACOS-1").unwrap(),
            codec.encode("NACOS-2").unwrap()
        );
    }

    #[test]
    fn test_single_byte_tamper_rejected() {
        let codec = codec();
        let token = codec.encode("NACOS-8F3A2C9D").unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();

        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let tampered = URL_SAFE_NO_PAD.encode(tampered);
            assert!(
                matches!(codec.decode(&tampered), Err(Error::InvalidToken)),
                "tampering byte {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = codec().encode("NACOS-1").unwrap();
        let other = QrCodec::new(&[9u8; KEY_LEN]).unwrap();
        assert!(matches!(other.decode(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = codec();
        assert!(matches!(codec.decode(""), Err(Error::InvalidToken)));
        assert!(matches!(codec.decode("not base64 !!"), Err(Error::InvalidToken)));
        assert!(matches!(codec.decode("AAAA"), Err(Error::InvalidToken)));
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let codec = codec();
        let token = codec.encode("NACOS-1").unwrap();
        assert_eq!(codec.decode(&format!("  {}\n", token)).unwrap(), "NACOS-1");
    }

    #[test]
    fn test_key_length_enforced() {
        assert!(matches!(QrCodec::new(&[1u8; 16]), Err(Error::Config(_))));
    }

    #[test]
    fn test_generated_key_loads() {
        let key = QrCodec::generate_key();
        let codec = QrCodec::from_base64_key(&key).unwrap();
        let token = codec.encode("NACOS-1").unwrap();
        assert_eq!(codec.decode(&token).unwrap(), "NACOS-1");
    }

    #[test]
    fn test_invalid_base64_key() {
        assert!(matches!(
            QrCodec::from_base64_key("%%%"),
            Err(Error::Config(_))
        ));
    }
}
