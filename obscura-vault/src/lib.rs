//! Authorization protocol and file vault for Obscura.
//!
//! Provides:
//! - [`FileVault`]: store a content-address under a fresh secret key, list
//!   records, and reveal them to their owner
//! - [`AuthorizationProtocol`]: one signed, time-limited round trip that
//!   recovers secret keys from their encrypted handles
//! - The capability seams the vault depends on: homomorphic encryption,
//!   structured-message signing and content-addressable upload
//! - [`VaultConfig`] with the record space, chain and window settings
//!
//! The vault never installs a tracing subscriber; embedders do.

pub mod authorization;
pub mod capability;
pub mod config;
pub mod error;
pub mod signer;
pub mod typed_data;
pub mod types;
pub mod upload;
pub mod vault;

pub use authorization::{AuthorizationProtocol, AuthorizationState, DecryptionOutcome};
pub use capability::{
    CapabilityError, HandleContractPair, HomomorphicEncryptionCapability, UserDecryptRequest,
};
pub use config::{VaultConfig, MAX_VALIDITY_DAYS};
pub use error::{VaultError, VaultResult};
pub use signer::{identity_for, verify_authorization, Ed25519Signer, SignerError, SigningCapability};
pub use typed_data::{signing_digest, AuthorizationMessage, DomainSeparator, TypeDescriptor, TypedField};
pub use types::{
    ContentAddress, EncryptedInput, EncryptionContext, RevealedFile, StoredFile, ValidityWindow,
};
pub use upload::{human_readable_size, ContentAddressableUpload, MockUpload};
pub use vault::{FileVault, KeySource};
