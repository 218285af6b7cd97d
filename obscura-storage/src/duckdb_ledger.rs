//! DuckDB-backed ledger. Persists file records across restarts.

use crate::error::{StorageError, StorageResult};
use crate::ledger::{system_clock, Clock, Ledger};
use crate::types::{EncryptedKeyHandle, FileRecord, Identity, LedgerOperation, Receipt};
use duckdb::{params, Connection};
use obscura_crypto::ProtectedReference;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const MEMORY_LIMIT: &str = "64MB";
const THREADS: u32 = 1;

/// Durable append-only ledger stored in DuckDB.
#[derive(Clone)]
pub struct DuckDbLedger {
    conn: Arc<Mutex<Connection>>,
    clock: Clock,
}

impl DuckDbLedger {
    /// Opens or creates a ledger at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = open_with_wal_recovery(path)?;
        initialize_record_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: system_clock(),
        })
    }

    /// Opens an in-memory ledger (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_record_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: system_clock(),
        })
    }

    /// Replaces the clock used to stamp new records.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned("duckdb ledger"))
    }
}

impl Ledger for DuckDbLedger {
    fn submit(&self, operation: LedgerOperation) -> StorageResult<Receipt> {
        let LedgerOperation::StoreFile {
            identity,
            file_name,
            protected_reference,
            encrypted_key_handle,
            input_proof,
        } = operation;

        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file_records WHERE identity = ?",
            params![identity.as_str()],
            |row| row.get(0),
        )?;
        let timestamp = (self.clock)();

        conn.execute(
            r#"
            INSERT INTO file_records (
                identity, idx, file_name, protected_reference,
                key_handle, input_proof, stored_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                identity.as_str(),
                count,
                file_name,
                protected_reference.as_str(),
                encrypted_key_handle.as_str(),
                hex::encode(&input_proof),
                timestamp,
            ],
        )?;
        debug!("ledger appended record {count} for {identity}");

        Ok(Receipt {
            identity,
            index: count as u64,
            timestamp,
        })
    }

    fn query(&self, identity: &Identity) -> StorageResult<Vec<FileRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT file_name, protected_reference, key_handle, stored_at \
             FROM file_records WHERE identity = ? ORDER BY idx",
        )?;

        let rows = stmt
            .query_map(params![identity.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(file_name, reference, handle, timestamp)| {
                let protected_reference = ProtectedReference::parse(&reference)
                    .map_err(|e| StorageError::Corrupt(format!("{file_name}: {e}")))?;
                Ok(FileRecord {
                    file_name,
                    protected_reference,
                    encrypted_key_handle: EncryptedKeyHandle::new(handle),
                    timestamp,
                })
            })
            .collect()
    }
}

fn initialize_record_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS file_records (
            identity VARCHAR NOT NULL,
            idx BIGINT NOT NULL,
            file_name VARCHAR NOT NULL,
            protected_reference VARCHAR NOT NULL,
            key_handle VARCHAR NOT NULL,
            input_proof VARCHAR NOT NULL DEFAULT '',
            stored_at BIGINT NOT NULL,
            PRIMARY KEY (identity, idx)
        );
        "#,
    )?;
    Ok(())
}

/// Opens the database file, discarding a stale write-ahead log once if the
/// first open fails. An unclean shutdown can leave a WAL that blocks reopening.
fn open_with_wal_recovery(path: &Path) -> StorageResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            let wal = wal_path(path);
            if !wal.exists() {
                return Err(err.into());
            }
            warn!("ledger open failed, discarding stale WAL {}", wal.display());
            std::fs::remove_file(&wal).map_err(|_| StorageError::from(err))?;
            Connection::open(path)?
        }
    };
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{MEMORY_LIMIT}'; PRAGMA threads={THREADS};"
    ))?;
    Ok(conn)
}

fn wal_path(path: &Path) -> PathBuf {
    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");
    PathBuf::from(wal)
}
