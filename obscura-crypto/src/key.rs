//! 12-digit secret keys and their generation.
//!
//! A secret key is the decimal rendering of an integer in
//! `[KEY_MIN, KEY_MAX]`, so it always has exactly [`KEY_DIGITS`] digits and
//! no leading zero. It also fits in the `u64` the homomorphic-encryption
//! service carries.

use crate::error::{CryptoError, CryptoResult};
use rand::TryRngCore;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of decimal digits in a secret key.
pub const KEY_DIGITS: usize = 12;

/// Smallest valid key value (`10^11`).
pub const KEY_MIN: u64 = 100_000_000_000;

/// Largest valid key value (`10^12 - 1`).
pub const KEY_MAX: u64 = 999_999_999_999;

const KEY_SPAN: u64 = KEY_MAX - KEY_MIN + 1;

/// A 12-digit decimal secret key.
///
/// Valid by construction: every constructor checks the digit invariant.
/// The digits are wiped from memory when the key is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    digits: String,
}

impl SecretKey {
    /// Parses a key string, rejecting anything that is not exactly 12 ASCII
    /// digits.
    pub fn parse(key: &str) -> CryptoResult<Self> {
        if key.len() != KEY_DIGITS {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "expected {KEY_DIGITS} digits, got {} characters",
                key.chars().count()
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CryptoError::InvalidKeyFormat(
                "key must contain only decimal digits".to_string(),
            ));
        }
        Ok(Self {
            digits: key.to_string(),
        })
    }

    /// Builds a key from its numeric value.
    pub fn from_u64(value: u64) -> CryptoResult<Self> {
        if !(KEY_MIN..=KEY_MAX).contains(&value) {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "value {value} is outside [{KEY_MIN}, {KEY_MAX}]"
            )));
        }
        Ok(Self {
            digits: value.to_string(),
        })
    }

    /// Returns the key as its 12-digit string.
    pub fn as_str(&self) -> &str {
        &self.digits
    }

    /// Returns the numeric value of the key.
    pub fn to_u64(&self) -> u64 {
        self.digits
            .bytes()
            .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'))
    }

    /// Iterates the key's digit values (0-9) in order.
    pub(crate) fn digit_values(&self) -> impl Iterator<Item = u8> + Clone + '_ {
        self.digits.bytes().map(|b| b - b'0')
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl FromStr for SecretKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Where the entropy behind a generated key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropySource {
    /// Operating system CSPRNG.
    Os,
    /// Wall-clock derived seed. Not suitable for production secrets.
    TimeFallback,
}

/// Returns true if `key` is exactly 12 decimal digits.
pub fn is_valid_secret_key(key: &str) -> bool {
    SecretKey::parse(key).is_ok()
}

/// Reduces 64 bits of entropy into the key range.
///
/// `KEY_MIN + (entropy mod 9·10^11)`; the modulo bias over a 64-bit input is
/// below 2^-24.
pub fn secret_key_from_entropy(entropy: u64) -> SecretKey {
    let value = KEY_MIN + entropy % KEY_SPAN;
    SecretKey {
        digits: value.to_string(),
    }
}

/// Generates a fresh secret key.
pub fn generate_secret_key() -> SecretKey {
    generate_secret_key_with_source().0
}

/// Generates a fresh secret key and reports which entropy source was used.
///
/// Falls back to a time-derived seed when the OS RNG is unavailable. That
/// path is predictable and is logged at `warn`; callers that must not accept
/// it should check the returned [`EntropySource`].
pub fn generate_secret_key_with_source() -> (SecretKey, EntropySource) {
    generate_secret_key_from(&mut rand::rngs::OsRng)
}

/// Generates a key from `rng`, falling back to the clock if it fails.
pub fn generate_secret_key_from<R>(rng: &mut R) -> (SecretKey, EntropySource)
where
    R: TryRngCore + ?Sized,
{
    match rng.try_next_u64() {
        Ok(entropy) => (secret_key_from_entropy(entropy), EntropySource::Os),
        Err(e) => {
            warn!("randomness unavailable ({e}), deriving secret key from the clock");
            (secret_key_from_entropy(time_seed()), EntropySource::TimeFallback)
        }
    }
}

fn time_seed() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    (now << 32) | (now.wrapping_mul(3) & 0xFFFF_FFFF)
}
