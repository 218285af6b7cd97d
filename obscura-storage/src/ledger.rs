//! Ledger abstraction backing the record store.
//!
//! The durable home of file records is an append-only ledger exposing two
//! operations: `submit` and `query`. The ledger assigns indices and
//! timestamps; the record store adds per-identity serialization on top.

use crate::error::{StorageError, StorageResult};
use crate::types::{FileRecord, Identity, LedgerOperation, Receipt};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Append-only ledger of file records.
pub trait Ledger: Send + Sync {
    /// Applies an operation and returns its receipt.
    fn submit(&self, operation: LedgerOperation) -> StorageResult<Receipt>;

    /// Returns all records for an identity, in append order.
    fn query(&self, identity: &Identity) -> StorageResult<Vec<FileRecord>>;
}

/// Clock used by in-process ledgers to stamp records (unix seconds).
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub(crate) fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp())
}

/// In-process ledger. Records live as long as the ledger.
pub struct MemoryLedger {
    records: RwLock<HashMap<Identity, Vec<FileRecord>>>,
    clock: Clock,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Creates a ledger stamping records with a custom clock.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    fn submit(&self, operation: LedgerOperation) -> StorageResult<Receipt> {
        let LedgerOperation::StoreFile {
            identity,
            file_name,
            protected_reference,
            encrypted_key_handle,
            input_proof: _,
        } = operation;

        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;
        let collection = records.entry(identity.clone()).or_default();
        let index = collection.len() as u64;
        let timestamp = (self.clock)();

        collection.push(FileRecord {
            file_name,
            protected_reference,
            encrypted_key_handle,
            timestamp,
        });

        Ok(Receipt {
            identity,
            index,
            timestamp,
        })
    }

    fn query(&self, identity: &Identity) -> StorageResult<Vec<FileRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::LockPoisoned("memory ledger"))?;
        Ok(records.get(identity).cloned().unwrap_or_default())
    }
}
