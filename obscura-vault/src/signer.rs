//! Signing capability and an Ed25519 implementation.
//!
//! The authorization protocol only sees [`SigningCapability`]. Wallet
//! integrations implement it outside this crate; [`Ed25519Signer`] is a
//! local signer for embedding and tests.

use crate::typed_data::{signing_digest, AuthorizationMessage, DomainSeparator, TypeDescriptor};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use obscura_storage::Identity;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors reported by a signing capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("signing request rejected: {0}")]
    Rejected(String),

    #[error("signing failed: {0}")]
    Failed(String),
}

/// Something that can sign a structured authorization message for an
/// identity.
#[async_trait]
pub trait SigningCapability: Send + Sync {
    /// Signs `message` under `domain` and `types`, returning raw signature
    /// bytes.
    async fn sign_structured_message(
        &self,
        domain: &DomainSeparator,
        types: &TypeDescriptor,
        message: &AuthorizationMessage,
    ) -> Result<Vec<u8>, SignerError>;
}

/// Ed25519 signer over the structured-message digest.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Identity owned by this signer.
    pub fn identity(&self) -> Identity {
        identity_for(&self.verifying_key())
    }
}

#[async_trait]
impl SigningCapability for Ed25519Signer {
    async fn sign_structured_message(
        &self,
        domain: &DomainSeparator,
        types: &TypeDescriptor,
        message: &AuthorizationMessage,
    ) -> Result<Vec<u8>, SignerError> {
        let digest = signing_digest(domain, types, message);
        Ok(self.signing_key.sign(&digest).to_bytes().to_vec())
    }
}

/// Derives the `0x`-prefixed 20-byte identity of a verifying key
/// (last 20 bytes of its SHA-256 hash).
pub fn identity_for(verifying_key: &VerifyingKey) -> Identity {
    let hash = Sha256::digest(verifying_key.as_bytes());
    Identity::new(format!("0x{}", hex::encode(&hash[12..])))
}

/// Checks `signature` against the structured-message digest.
pub fn verify_authorization(
    verifying_key: &VerifyingKey,
    domain: &DomainSeparator,
    types: &TypeDescriptor,
    message: &AuthorizationMessage,
    signature: &[u8],
) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    let digest = signing_digest(domain, types, message);
    verifying_key.verify(&digest, &signature).is_ok()
}
