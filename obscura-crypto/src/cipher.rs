//! Keyed byte transform for content-addresses.
//!
//! Each plaintext byte is shifted by one digit of the 12-digit key, cycling
//! with period 12:
//!
//! ```text
//! encrypt[i] = (plain[i] + digit[i % 12]) mod 256
//! decrypt[i] = (cipher[i] - digit[i % 12] + 256) mod 256
//! ```
//!
//! The output is framed as lowercase hex, two characters per byte.
//!
//! # Security
//!
//! This is obfuscation, not confidentiality. There is no diffusion and no
//! authentication, and the additive period-12 structure is recoverable by
//! frequency analysis on longer inputs. Decrypting with the wrong key
//! yields a well-formed but garbled string rather than an error.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SecretKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex-encoded, obfuscated content-address.
///
/// Always even-length lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtectedReference(String);

impl ProtectedReference {
    /// Validates hex framing. Upper-case digits are accepted and normalized.
    pub fn parse(hex: &str) -> CryptoResult<Self> {
        if hex.len() % 2 != 0 {
            return Err(CryptoError::InvalidCiphertextEncoding(format!(
                "odd hex length {}",
                hex.len()
            )));
        }
        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidCiphertextEncoding(format!(
                "non-hex character {bad:?}"
            )));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of obfuscated bytes.
    pub fn byte_len(&self) -> usize {
        self.0.len() / 2
    }

    fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        hex::decode(&self.0).map_err(|e| CryptoError::InvalidCiphertextEncoding(e.to_string()))
    }
}

impl fmt::Display for ProtectedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProtectedReference {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProtectedReference> for String {
    fn from(value: ProtectedReference) -> Self {
        value.0
    }
}

/// Obfuscates a UTF-8 content-address with `key`.
pub fn encrypt(plaintext: &str, key: &SecretKey) -> ProtectedReference {
    let shifted: Vec<u8> = plaintext
        .bytes()
        .zip(key.digit_values().cycle())
        .map(|(byte, digit)| byte.wrapping_add(digit))
        .collect();
    ProtectedReference(hex::encode(shifted))
}

/// Reverses [`encrypt`].
///
/// Invalid UTF-8 produced by a wrong key is replaced with U+FFFD.
pub fn decrypt(reference: &ProtectedReference, key: &SecretKey) -> CryptoResult<String> {
    let restored: Vec<u8> = reference
        .to_bytes()?
        .into_iter()
        .zip(key.digit_values().cycle())
        .map(|(byte, digit)| byte.wrapping_sub(digit))
        .collect();
    Ok(String::from_utf8_lossy(&restored).into_owned())
}

/// String-keyed [`encrypt`]: validates the key before transforming.
pub fn encrypt_reference(plaintext: &str, key: &str) -> CryptoResult<ProtectedReference> {
    let key = SecretKey::parse(key)?;
    Ok(encrypt(plaintext, &key))
}

/// String-keyed [`decrypt`]: validates the key, then the hex framing.
pub fn decrypt_reference(reference: &str, key: &str) -> CryptoResult<String> {
    let key = SecretKey::parse(key)?;
    let reference = ProtectedReference::parse(reference)?;
    decrypt(&reference, &key)
}
