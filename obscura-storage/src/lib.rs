//! Record storage for Obscura.
//!
//! Keeps an append-only, per-identity collection of file records. Each
//! record pairs a protected content-address with the opaque handle of its
//! encrypted secret key.
//!
//! # Architecture
//!
//! - A [`Ledger`] is the durable backing: `submit` appends, `query` reads
//! - [`MemoryLedger`] keeps records in process; [`DuckDbLedger`] persists them
//! - [`RecordStore`] serializes appends per identity so indices stay dense
//!   and unique, and broadcasts a [`RecordEvent`] for every stored file

mod duckdb_ledger;
mod error;
mod ledger;
mod record_store;
mod types;

pub use duckdb_ledger::DuckDbLedger;
pub use error::{StorageError, StorageResult};
pub use ledger::{Clock, Ledger, MemoryLedger};
pub use record_store::RecordStore;
pub use types::{
    EncryptedKeyHandle, FileRecord, Identity, LedgerOperation, Receipt, RecordEvent,
};
