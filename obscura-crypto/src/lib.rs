//! Key material and content-address obfuscation for Obscura.
//!
//! Provides:
//! - A keyed byte transform that turns a content-address into a
//!   [`ProtectedReference`] (hex framed)
//! - 12-digit [`SecretKey`] generation and validation
//! - Single-use X25519 keypairs for authorization requests
//!
//! # Architecture
//!
//! Protection is two-tier:
//!
//! 1. **Secret Key**: A random 12-digit number generated locally for each
//!    stored file. It scrambles the content-address with the transform in
//!    [`cipher`]. The key itself is never stored in plaintext.
//!
//! 2. **Encrypted Key Handle**: The secret key, encrypted by an external
//!    homomorphic-encryption service. Only the handle is written next to the
//!    protected reference; recovering the key requires a signed,
//!    time-limited authorization from the owner.
//!
//! The transform in [`cipher`] is obfuscation, not confidentiality. See the
//! module documentation for the known weakness.

pub mod cipher;
pub mod ephemeral;
mod error;
pub mod key;

pub use cipher::{
    decrypt, decrypt_reference, encrypt, encrypt_reference, ProtectedReference,
};
pub use ephemeral::{seal_to, EphemeralKeyPair, SealedValue};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    generate_secret_key, generate_secret_key_from, generate_secret_key_with_source,
    is_valid_secret_key, secret_key_from_entropy, EntropySource, SecretKey, KEY_DIGITS, KEY_MAX, KEY_MIN,
};
