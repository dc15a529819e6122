//! Authenticated token codec.
//!
//! A token is `base64(ciphertext) "." base64(iv) "." base64(mac)`:
//! the JSON payload encrypted with AES-256-CBC under a fresh random IV, then
//! HMAC-SHA-256 over the two base64 segments so ciphertext and IV are bound
//! together (encrypt-then-MAC). Cipher and MAC use separate subkeys derived
//! from the 32-byte master key, so the raw key is never shared between the
//! two primitives.
//!
//! Decryption verifies the MAC with a constant-time comparison before touching
//! the cipher. Any failure yields a [`DecodeError`], which callers treat as
//! "no session present": a tampered or foreign-key token is expected client
//! input, not a server error.

use crate::errors::SessionError;
use crate::session::TokenPayload;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Why a presented token was rejected. Both variants degrade to "no session"
/// at the middleware boundary; they are distinct because a wrong segment count
/// is a parse failure while a MAC mismatch is a verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("token does not have the ciphertext.iv.mac shape")]
    Malformed,
    #[error("token failed integrity verification")]
    Integrity,
}

/// Encrypts and decrypts session tokens under a fixed process key.
///
/// Key material is resolved once at construction and read-only afterwards, so
/// a codec can be shared freely across concurrent requests.
pub struct TokenCodec {
    enc_key: [u8; KEY_LEN],
    /// Pre-keyed MAC instance, cloned per operation.
    mac: HmacSha256,
}

impl TokenCodec {
    /// Builds a codec from a 32-byte master key.
    pub fn new(key: &[u8]) -> Result<Self, SessionError> {
        if key.len() != KEY_LEN {
            return Err(SessionError::InvalidKeyLength(key.len()));
        }
        let enc_key = derive_subkey(key, b"stateless-session enc")?;
        let mac_key = derive_subkey(key, b"stateless-session mac")?;
        let mac = <HmacSha256 as Mac>::new_from_slice(&mac_key)
            .map_err(|_| SessionError::InvalidKeyLength(mac_key.len()))?;
        Ok(Self { enc_key, mac })
    }

    /// Encrypts a payload into a token, with a fresh IV on every call.
    pub fn encrypt(&self, payload: &TokenPayload) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(payload)?;

        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.enc_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let ct_b64 = BASE64.encode(&ciphertext);
        let iv_b64 = BASE64.encode(iv);
        let tag = self.tag(&ct_b64, &iv_b64);

        Ok(format!("{ct_b64}.{iv_b64}.{}", BASE64.encode(tag)))
    }

    /// Decrypts a presented token back into a payload.
    ///
    /// The MAC is recomputed over the presented ciphertext and IV segments and
    /// compared in constant time before any decryption happens.
    pub fn decrypt(&self, token: &str) -> Result<TokenPayload, DecodeError> {
        let mut segments = token.split('.');
        let (ct_b64, iv_b64, mac_b64) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(ct), Some(iv), Some(mac), None) => (ct, iv, mac),
            _ => return Err(DecodeError::Malformed),
        };

        let presented = BASE64.decode(mac_b64).map_err(|_| DecodeError::Malformed)?;
        let expected = self.tag(ct_b64, iv_b64);
        if presented.ct_eq(&expected[..]).unwrap_u8() != 1 {
            return Err(DecodeError::Integrity);
        }

        let ciphertext = BASE64.decode(ct_b64).map_err(|_| DecodeError::Malformed)?;
        let iv: [u8; IV_LEN] = BASE64
            .decode(iv_b64)
            .map_err(|_| DecodeError::Malformed)?
            .try_into()
            .map_err(|_| DecodeError::Malformed)?;

        let plaintext = Aes256CbcDec::new(&self.enc_key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| DecodeError::Malformed)?;

        serde_json::from_slice(&plaintext).map_err(|_| DecodeError::Malformed)
    }

    fn tag(&self, ct_b64: &str, iv_b64: &str) -> [u8; 32] {
        let mut mac = self.mac.clone();
        mac.update(ct_b64.as_bytes());
        mac.update(iv_b64.as_bytes());
        mac.finalize().into_bytes().into()
    }
}

fn derive_subkey(master: &[u8], label: &[u8]) -> Result<[u8; KEY_LEN], SessionError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(master)
        .map_err(|_| SessionError::InvalidKeyLength(master.len()))?;
    mac.update(label);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn codec(byte: u8) -> TokenCodec {
        TokenCodec::new(&[byte; KEY_LEN]).unwrap()
    }

    fn payload() -> TokenPayload {
        let mut data = Map::new();
        data.insert("user".to_string(), json!("alice"));
        data.insert("cart".to_string(), json!([1, 2, 3]));
        TokenPayload {
            id: Some("abc123".to_string()),
            timestamp: 1_700_000_000_000,
            data,
        }
    }

    #[test]
    fn round_trip_preserves_payload() {
        let codec = codec(1);
        let token = codec.encrypt(&payload()).unwrap();
        let decoded = codec.decrypt(&token).unwrap();
        assert_eq!(decoded.id.as_deref(), Some("abc123"));
        assert_eq!(decoded.timestamp, 1_700_000_000_000);
        assert_eq!(decoded.data.get("user"), Some(&json!("alice")));
        assert_eq!(decoded.data.get("cart"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn token_has_three_base64_segments() {
        let token = codec(1).encrypt(&payload()).unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            assert!(!segment.is_empty());
            assert!(segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='));
        }
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let codec = codec(1);
        let p = payload();
        let a = codec.encrypt(&p).unwrap();
        let b = codec.encrypt(&p).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = codec(1).encrypt(&payload()).unwrap();
        assert_eq!(codec(2).decrypt(&token), Err(DecodeError::Integrity));
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let codec = codec(1);
        assert_eq!(codec.decrypt("onlyone"), Err(DecodeError::Malformed));
        assert_eq!(codec.decrypt("a.b"), Err(DecodeError::Malformed));
        assert_eq!(codec.decrypt("a.b.c.d"), Err(DecodeError::Malformed));
    }

    // Flip a single bit inside the decoded form of one segment and reassemble.
    fn corrupt_segment(token: &str, segment_index: usize, bit: usize) -> String {
        let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut bytes = BASE64.decode(&segments[segment_index]).unwrap();
        bytes[bit / 8] ^= 1 << (bit % 8);
        segments[segment_index] = BASE64.encode(&bytes);
        segments.join(".")
    }

    #[test]
    fn ciphertext_bit_flips_are_detected() {
        let codec = codec(1);
        let token = codec.encrypt(&payload()).unwrap();
        for bit in [0, 7, 64, 127] {
            let tampered = corrupt_segment(&token, 0, bit);
            assert_eq!(codec.decrypt(&tampered), Err(DecodeError::Integrity));
        }
    }

    #[test]
    fn iv_bit_flips_are_detected() {
        let codec = codec(1);
        let token = codec.encrypt(&payload()).unwrap();
        for bit in [0, 42, 127] {
            let tampered = corrupt_segment(&token, 1, bit);
            assert_eq!(codec.decrypt(&tampered), Err(DecodeError::Integrity));
        }
    }

    #[test]
    fn truncated_mac_is_rejected() {
        let codec = codec(1);
        let token = codec.encrypt(&payload()).unwrap();
        let (body, _) = token.rsplit_once('.').unwrap();
        let truncated = format!("{body}.");
        assert!(codec.decrypt(&truncated).is_err());
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(matches!(
            TokenCodec::new(&[0u8; 16]),
            Err(SessionError::InvalidKeyLength(16))
        ));
    }
}
