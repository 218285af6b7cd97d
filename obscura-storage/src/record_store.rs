//! Per-identity append-only record store.
//!
//! Appends for the same identity are serialized through a per-identity slot
//! so the ledger sees them one at a time and indices come out dense. Appends
//! for different identities only contend on the short slot lookup.

use crate::error::{StorageError, StorageResult};
use crate::ledger::Ledger;
use crate::types::{EncryptedKeyHandle, FileRecord, Identity, LedgerOperation, RecordEvent};
use obscura_crypto::ProtectedReference;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Next index expected for an identity; `None` until first use.
type CounterSlot = Arc<Mutex<Option<u64>>>;

/// Append-only store of file records keyed by identity.
pub struct RecordStore {
    ledger: Arc<dyn Ledger>,
    /// One slot per identity ever appended to. Never evicted.
    counters: Mutex<HashMap<Identity, CounterSlot>>,
    events: broadcast::Sender<RecordEvent>,
}

impl RecordStore {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            ledger,
            counters: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Subscribes to `FileStored` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }

    /// Appends a record and returns its index.
    ///
    /// If the ledger answers with an index below the expected one, the
    /// record stays in the ledger but `IndexConflict` is returned and the
    /// counter is reloaded from the ledger on the next append.
    pub fn append(
        &self,
        identity: &Identity,
        file_name: &str,
        protected_reference: ProtectedReference,
        encrypted_key_handle: EncryptedKeyHandle,
        input_proof: Vec<u8>,
    ) -> StorageResult<u64> {
        let slot = self.slot(identity)?;
        let mut next = slot
            .lock()
            .map_err(|_| StorageError::LockPoisoned("record counter"))?;

        let expected = match *next {
            Some(n) => n,
            None => self.ledger.query(identity)?.len() as u64,
        };

        let receipt = self.ledger.submit(LedgerOperation::StoreFile {
            identity: identity.clone(),
            file_name: file_name.to_string(),
            protected_reference: protected_reference.clone(),
            encrypted_key_handle,
            input_proof,
        })?;

        if receipt.index < expected {
            *next = None;
            return Err(StorageError::IndexConflict {
                expected,
                actual: receipt.index,
            });
        }
        if receipt.index > expected {
            warn!(
                "ledger holds records for {identity} not written through this store, \
                 resyncing at index {}",
                receipt.index
            );
        }
        *next = Some(receipt.index + 1);
        drop(next);

        debug!("stored record {} for {identity}", receipt.index);
        // No subscribers is fine.
        let _ = self.events.send(RecordEvent::FileStored {
            identity: identity.clone(),
            index: receipt.index,
            file_name: file_name.to_string(),
            protected_reference,
            timestamp: receipt.timestamp,
        });

        Ok(receipt.index)
    }

    /// Number of records stored for an identity.
    pub fn count(&self, identity: &Identity) -> StorageResult<u64> {
        Ok(self.ledger.query(identity)?.len() as u64)
    }

    /// Returns the record at `index`.
    pub fn get(&self, identity: &Identity, index: u64) -> StorageResult<FileRecord> {
        let records = self.ledger.query(identity)?;
        let count = records.len() as u64;
        usize::try_from(index)
            .ok()
            .and_then(|i| records.into_iter().nth(i))
            .ok_or(StorageError::IndexOutOfRange { index, count })
    }

    /// Returns every record for an identity in append order.
    pub fn list(&self, identity: &Identity) -> StorageResult<Vec<FileRecord>> {
        self.ledger.query(identity)
    }

    fn slot(&self, identity: &Identity) -> StorageResult<CounterSlot> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StorageError::LockPoisoned("record counters"))?;
        Ok(Arc::clone(counters.entry(identity.clone()).or_default()))
    }
}
