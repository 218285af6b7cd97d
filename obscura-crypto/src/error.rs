//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised while validating key material or decoding references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid secret key format: {0}")]
    InvalidKeyFormat(String),

    #[error("invalid ciphertext encoding: {0}")]
    InvalidCiphertextEncoding(String),

    #[error("envelope error: {0}")]
    Envelope(String),
}
