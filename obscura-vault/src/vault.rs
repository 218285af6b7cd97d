//! File vault: stores protected file references and reveals them to their
//! owner.
//!
//! Storing a file generates a fresh secret key, scrambles the
//! content-address with it, hands the key to the homomorphic service and
//! appends the resulting record. Revealing a file reverses this through one
//! signed authorization round trip.

use crate::authorization::AuthorizationProtocol;
use crate::capability::HomomorphicEncryptionCapability;
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::signer::SigningCapability;
use crate::types::{EncryptionContext, RevealedFile, StoredFile};
use crate::upload::ContentAddressableUpload;
use obscura_crypto::{
    decrypt, encrypt, generate_secret_key_with_source, EntropySource, SecretKey,
};
use obscura_storage::{FileRecord, Identity, RecordEvent, RecordStore, StorageResult};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Produces a fresh secret key and reports where its entropy came from.
pub type KeySource = Arc<dyn Fn() -> (SecretKey, EntropySource) + Send + Sync>;

/// Orchestrates key generation, obfuscation, storage and authorized reveal.
///
/// Record store calls may block on the ledger, so they run on tokio's
/// blocking pool.
pub struct FileVault {
    store: Arc<RecordStore>,
    capability: Arc<dyn HomomorphicEncryptionCapability>,
    authorization: AuthorizationProtocol,
    key_source: KeySource,
}

impl FileVault {
    /// Creates a vault after validating `config`.
    pub fn new(
        config: VaultConfig,
        store: Arc<RecordStore>,
        capability: Arc<dyn HomomorphicEncryptionCapability>,
    ) -> VaultResult<Self> {
        config.validate()?;
        let authorization = AuthorizationProtocol::new(Arc::clone(&capability), config);
        Ok(Self {
            store,
            capability,
            authorization,
            key_source: Arc::new(generate_secret_key_with_source),
        })
    }

    /// Replaces the OS-backed key generator.
    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        self.authorization.config()
    }

    pub fn authorization(&self) -> &AuthorizationProtocol {
        &self.authorization
    }

    /// Subscribes to `FileStored` notifications from the underlying store.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.store.subscribe()
    }

    /// Protects `content_address` under a new secret key and appends the
    /// record for `identity`.
    pub async fn store_file(
        &self,
        identity: &Identity,
        file_name: &str,
        content_address: &str,
    ) -> VaultResult<StoredFile> {
        if file_name.trim().is_empty() {
            return Err(VaultError::InvalidInput("file name must not be empty".into()));
        }

        let (secret_key, source) = (self.key_source)();
        if source == EntropySource::TimeFallback {
            if self.config().require_os_entropy {
                return Err(VaultError::WeakEntropy);
            }
            warn!("storing {file_name} with a time-derived secret key");
        }

        let protected_reference = encrypt(content_address, &secret_key);

        let context = EncryptionContext {
            record_space_address: self.config().record_space_address.clone(),
            identity: identity.clone(),
        };
        let input = self
            .capability
            .encrypt_value(&context, secret_key.to_u64())
            .await
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let index = {
            let identity = identity.clone();
            let file_name = file_name.to_string();
            let reference = protected_reference.clone();
            let handle = input.handle.clone();
            let proof = input.proof;
            self.blocking(move |store| {
                store.append(&identity, &file_name, reference, handle, proof)
            })
            .await?
        };
        info!("stored {file_name} for {identity} at index {index}");

        Ok(StoredFile {
            index,
            file_name: file_name.to_string(),
            content_address: content_address.to_string(),
            protected_reference,
            key_handle: input.handle,
            secret_key,
        })
    }

    /// Uploads `bytes`, then stores the returned content-address.
    pub async fn upload_and_store(
        &self,
        identity: &Identity,
        file_name: &str,
        bytes: &[u8],
        uploader: &dyn ContentAddressableUpload,
    ) -> VaultResult<StoredFile> {
        if file_name.trim().is_empty() {
            return Err(VaultError::InvalidInput("file name must not be empty".into()));
        }
        let content_address = uploader.upload(bytes).await?;
        self.store_file(identity, file_name, &content_address).await
    }

    /// Reveals one record with the default validity window.
    pub async fn reveal_file(
        &self,
        identity: &Identity,
        index: u64,
        signer: Option<&dyn SigningCapability>,
    ) -> VaultResult<RevealedFile> {
        let days = self.config().default_validity_days;
        self.reveal_file_with_window(identity, index, signer, days)
            .await
    }

    /// Reveals one record, authorizing for `duration_days`.
    pub async fn reveal_file_with_window(
        &self,
        identity: &Identity,
        index: u64,
        signer: Option<&dyn SigningCapability>,
        duration_days: u32,
    ) -> VaultResult<RevealedFile> {
        let owner = identity.clone();
        let record = self
            .blocking(move |store| store.get(&owner, index))
            .await?;
        let mut outcome = self
            .authorization
            .authorize_and_decrypt(
                identity,
                std::slice::from_ref(&record.encrypted_key_handle),
                signer,
                duration_days,
            )
            .await?;
        let secret_key = outcome.take(&record.encrypted_key_handle)?;
        reveal(identity, index, record, secret_key)
    }

    /// Reveals several records with one signature and one round trip.
    ///
    /// Results are returned in the order of `indices`. An out-of-range index
    /// fails the whole call before anything is signed; a denied handle only
    /// fails its own entry.
    pub async fn reveal_files(
        &self,
        identity: &Identity,
        indices: &[u64],
        signer: Option<&dyn SigningCapability>,
        duration_days: u32,
    ) -> VaultResult<Vec<VaultResult<RevealedFile>>> {
        let snapshot = self.list_files(identity).await?;
        let count = snapshot.len() as u64;

        let mut selected = Vec::with_capacity(indices.len());
        for &index in indices {
            let record = usize::try_from(index)
                .ok()
                .and_then(|i| snapshot.get(i))
                .ok_or(VaultError::IndexOutOfRange { index, count })?;
            selected.push((index, record.clone()));
        }

        let handles: Vec<_> = selected
            .iter()
            .map(|(_, r)| r.encrypted_key_handle.clone())
            .collect();
        let outcome = self
            .authorization
            .authorize_and_decrypt(identity, &handles, signer, duration_days)
            .await?;

        Ok(selected
            .into_iter()
            .map(|(index, record)| {
                let secret_key = outcome.result(&record.encrypted_key_handle)?;
                reveal(identity, index, record, secret_key)
            })
            .collect())
    }

    /// Every record stored for `identity`, in append order.
    pub async fn list_files(&self, identity: &Identity) -> VaultResult<Vec<FileRecord>> {
        let identity = identity.clone();
        self.blocking(move |store| store.list(&identity)).await
    }

    pub async fn record_count(&self, identity: &Identity) -> VaultResult<u64> {
        let identity = identity.clone();
        self.blocking(move |store| store.count(&identity)).await
    }

    async fn blocking<T, F>(&self, f: F) -> VaultResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecordStore) -> StorageResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| VaultError::Task(e.to_string()))?;
        Ok(result?)
    }
}

fn reveal(
    identity: &Identity,
    index: u64,
    record: FileRecord,
    secret_key: SecretKey,
) -> VaultResult<RevealedFile> {
    let content_address = decrypt(&record.protected_reference, &secret_key)?;
    info!("revealed record {index} for {identity}");
    Ok(RevealedFile {
        index,
        file_name: record.file_name,
        secret_key,
        content_address,
        stored_at: record.timestamp,
    })
}
