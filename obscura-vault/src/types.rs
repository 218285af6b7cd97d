//! Types exchanged between the vault, its callers and its capabilities.

use crate::error::{VaultError, VaultResult};
use chrono::{DateTime, Duration, Utc};
use obscura_crypto::{ProtectedReference, SecretKey};
use obscura_storage::{EncryptedKeyHandle, Identity};
use serde::{Deserialize, Serialize};

/// A content-address as returned by an uploader (e.g. an IPFS CID).
pub type ContentAddress = String;

/// Time span during which a decryption authorization is honoured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub not_before: DateTime<Utc>,
    pub duration_days: u32,
}

impl ValidityWindow {
    /// Builds a window starting at `not_before`.
    ///
    /// `duration_days` must be in `1..=max_days`.
    pub fn new(not_before: DateTime<Utc>, duration_days: u32, max_days: u32) -> VaultResult<Self> {
        if duration_days == 0 {
            return Err(VaultError::InvalidGrantWindow(
                "duration must be at least one day".into(),
            ));
        }
        if duration_days > max_days {
            return Err(VaultError::InvalidGrantWindow(format!(
                "duration of {duration_days} days exceeds the {max_days}-day limit"
            )));
        }
        Ok(Self {
            not_before,
            duration_days,
        })
    }

    /// Builds a window starting now.
    pub fn starting_now(duration_days: u32, max_days: u32) -> VaultResult<Self> {
        Self::new(Utc::now(), duration_days, max_days)
    }

    /// End of the window, saturating at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.not_before
            .checked_add_signed(Duration::days(i64::from(self.duration_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether `instant` falls inside `[not_before, expires_at)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.not_before && instant < self.expires_at()
    }
}

/// Binds an encrypted value to the record space and the identity submitting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionContext {
    pub record_space_address: String,
    pub identity: Identity,
}

/// A value encrypted by the homomorphic capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: EncryptedKeyHandle,
    /// Proof that the handle was produced for the given context.
    pub proof: Vec<u8>,
}

/// Result of storing a file.
///
/// Carries the freshly generated secret key so the caller can show or
/// share it; the vault keeps no copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub index: u64,
    pub file_name: String,
    pub content_address: ContentAddress,
    pub protected_reference: ProtectedReference,
    pub key_handle: EncryptedKeyHandle,
    pub secret_key: SecretKey,
}

/// A record whose secret key was recovered and whose reference was decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealedFile {
    pub index: u64,
    pub file_name: String,
    pub secret_key: SecretKey,
    pub content_address: ContentAddress,
    /// Unix seconds the record was stored at.
    pub stored_at: i64,
}
