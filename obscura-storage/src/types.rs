//! Record model shared by the ledger and the record store.

use obscura_crypto::ProtectedReference;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The owner on whose behalf records are stored and retrieved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque token standing in for an encrypted secret key.
///
/// Produced by the homomorphic-encryption service; stored and returned
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedKeyHandle(String);

impl EncryptedKeyHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncryptedKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored file reference. Immutable once appended.
///
/// Field order matches the ledger tuple
/// `(file_name, protected_reference, encrypted_key_handle, timestamp)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_name: String,
    pub protected_reference: ProtectedReference,
    pub encrypted_key_handle: EncryptedKeyHandle,
    /// Unix seconds, assigned by the ledger at append time.
    pub timestamp: i64,
}

/// An operation submitted to the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerOperation {
    StoreFile {
        identity: Identity,
        file_name: String,
        protected_reference: ProtectedReference,
        encrypted_key_handle: EncryptedKeyHandle,
        /// Proof that the handle was produced for this identity and record
        /// space. Verified by the ledger, not by the store.
        input_proof: Vec<u8>,
    },
}

/// Ledger acknowledgement of a submitted operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub identity: Identity,
    /// Index assigned to the new record.
    pub index: u64,
    /// Timestamp written into the record.
    pub timestamp: i64,
}

/// Notifications broadcast by the record store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordEvent {
    FileStored {
        identity: Identity,
        index: u64,
        file_name: String,
        protected_reference: ProtectedReference,
        timestamp: i64,
    },
}
