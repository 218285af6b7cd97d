//! Vault error types.

use obscura_crypto::CryptoError;
use obscura_storage::{EncryptedKeyHandle, StorageError};
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors surfaced by the authorization protocol and the file vault.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid secret key format: {0}")]
    InvalidKeyFormat(String),

    #[error("invalid ciphertext encoding: {0}")]
    InvalidCiphertextEncoding(String),

    #[error("record index {index} out of range (count {count})")]
    IndexOutOfRange { index: u64, count: u64 },

    #[error("no signing capability available")]
    SignerUnavailable,

    #[error("signature failed: {0}")]
    SignatureFailed(String),

    #[error("authorization service unavailable: {0}")]
    AuthorizationServiceUnavailable(String),

    #[error("invalid grant window: {0}")]
    InvalidGrantWindow(String),

    #[error("decryption denied for handle {handle}")]
    DecryptionDenied { handle: EncryptedKeyHandle },

    #[error("key encryption failed: {0}")]
    Encryption(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("secret key was derived without OS randomness")]
    WeakEntropy,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VaultError {
    /// Whether the caller may retry the same operation later.
    ///
    /// Nothing is retried internally.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthorizationServiceUnavailable(_))
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyFormat(msg) => Self::InvalidKeyFormat(msg),
            CryptoError::InvalidCiphertextEncoding(msg) => Self::InvalidCiphertextEncoding(msg),
            CryptoError::Envelope(msg) => Self::Encryption(msg),
        }
    }
}

impl From<StorageError> for VaultError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::IndexOutOfRange { index, count } => {
                Self::IndexOutOfRange { index, count }
            }
            other => Self::Storage(other),
        }
    }
}
