//! Homomorphic encryption capability.
//!
//! The service that encrypts secret keys into opaque handles and, given a
//! signed authorization, hands the plaintext values back. It is external to
//! the vault and modelled as a trait object.

use crate::types::{EncryptedInput, EncryptionContext, ValidityWindow};
use async_trait::async_trait;
use obscura_crypto::EphemeralKeyPair;
use obscura_storage::{EncryptedKeyHandle, Identity};
use std::collections::HashMap;
use thiserror::Error;

/// Errors reported by the homomorphic encryption service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The service could not be reached or did not answer.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service did not accept the signature on the request.
    #[error("signature rejected: {0}")]
    InvalidSignature(String),

    /// The service did not accept the validity window.
    #[error("validity window rejected: {0}")]
    InvalidWindow(String),
}

/// A handle together with the record space that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandleContractPair {
    pub handle: EncryptedKeyHandle,
    pub contract_address: String,
}

/// One authorized decryption round trip.
///
/// The service re-encrypts each value to the keypair's public half; the
/// client side of the capability opens them with the private half.
pub struct UserDecryptRequest<'a> {
    pub handles: &'a [HandleContractPair],
    pub keypair: &'a EphemeralKeyPair,
    pub signature: &'a [u8],
    pub contract_addresses: &'a [String],
    pub identity: &'a Identity,
    pub window: ValidityWindow,
}

#[async_trait]
pub trait HomomorphicEncryptionCapability: Send + Sync {
    /// Encrypts `value` for `context`, returning its handle and input proof.
    async fn encrypt_value(
        &self,
        context: &EncryptionContext,
        value: u64,
    ) -> Result<EncryptedInput, CapabilityError>;

    /// Recovers the plaintext values of the requested handles.
    ///
    /// Handles the identity is not entitled to are left out of the result.
    async fn authorized_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<HashMap<EncryptedKeyHandle, u64>, CapabilityError>;
}
