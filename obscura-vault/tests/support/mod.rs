//! Shared test helpers: an in-memory homomorphic encryption service and
//! signers that misbehave on purpose.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use obscura_crypto::seal_to;
use obscura_storage::{EncryptedKeyHandle, Identity, MemoryLedger, RecordStore};
use obscura_vault::{
    verify_authorization, AuthorizationMessage, CapabilityError, DomainSeparator, Ed25519Signer,
    EncryptedInput, EncryptionContext, FileVault, HomomorphicEncryptionCapability, SignerError,
    KeySource, SigningCapability, TypeDescriptor, UserDecryptRequest, VaultConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceMode {
    Normal,
    Unavailable,
    /// Never answers `authorized_decrypt`.
    Hang,
}

#[derive(Default)]
struct ServiceState {
    next_handle: u64,
    values: HashMap<EncryptedKeyHandle, (Identity, u64)>,
    owners: HashMap<Identity, VerifyingKey>,
    overrides: HashMap<EncryptedKeyHandle, u64>,
    unsolicited: HashMap<EncryptedKeyHandle, u64>,
    seen_public_keys: Vec<[u8; 32]>,
    seen_windows: Vec<u32>,
    seen_batches: Vec<usize>,
}

/// In-memory stand-in for the homomorphic encryption service.
///
/// Values are returned only to the identity that encrypted them, and only
/// when the request carries a valid signature from that identity's
/// registered key. Returned values travel sealed to the request's ephemeral
/// public key and are opened with its private half, as a real client would.
pub struct FakeService {
    config: VaultConfig,
    mode: Mutex<ServiceMode>,
    state: Mutex<ServiceState>,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl FakeService {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            mode: Mutex::new(ServiceMode::Normal),
            state: Mutex::new(ServiceState::default()),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: ServiceMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Lets requests signed by `signer` act for `signer.identity()`.
    pub fn register(&self, signer: &Ed25519Signer) {
        self.state
            .lock()
            .unwrap()
            .owners
            .insert(signer.identity(), signer.verifying_key());
    }

    /// Makes the service return `value` for `handle` instead of the
    /// encrypted one.
    pub fn override_value(&self, handle: &EncryptedKeyHandle, value: u64) {
        self.state
            .lock()
            .unwrap()
            .overrides
            .insert(handle.clone(), value);
    }

    /// Adds an entry to every answer, whether requested or not.
    pub fn add_unsolicited(&self, handle: &str, value: u64) {
        self.state
            .lock()
            .unwrap()
            .unsolicited
            .insert(EncryptedKeyHandle::new(handle), value);
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    pub fn seen_public_keys(&self) -> Vec<[u8; 32]> {
        self.state.lock().unwrap().seen_public_keys.clone()
    }

    pub fn seen_windows(&self) -> Vec<u32> {
        self.state.lock().unwrap().seen_windows.clone()
    }

    pub fn seen_batches(&self) -> Vec<usize> {
        self.state.lock().unwrap().seen_batches.clone()
    }

    fn mode(&self) -> ServiceMode {
        *self.mode.lock().unwrap()
    }

    fn answer(
        &self,
        request: &UserDecryptRequest<'_>,
    ) -> Result<HashMap<EncryptedKeyHandle, u64>, CapabilityError> {
        let public_key = request.keypair.public_bytes();
        let mut state = self.state.lock().unwrap();
        state.seen_public_keys.push(public_key);
        state.seen_windows.push(request.window.duration_days);
        state.seen_batches.push(request.handles.len());

        if !request.window.contains(Utc::now()) {
            return Err(CapabilityError::InvalidWindow("window not active".into()));
        }

        let owner_key = state.owners.get(request.identity).ok_or_else(|| {
            CapabilityError::InvalidSignature(format!("unknown identity {}", request.identity))
        })?;
        let message = AuthorizationMessage {
            public_key: public_key.to_vec(),
            contract_addresses: request.contract_addresses.to_vec(),
            start_timestamp: request.window.not_before.timestamp(),
            duration_days: request.window.duration_days,
            extra_data: Vec::new(),
        };
        if !verify_authorization(
            owner_key,
            &DomainSeparator::decryption(&self.config),
            &TypeDescriptor::user_decrypt_request(),
            &message,
            request.signature,
        ) {
            return Err(CapabilityError::InvalidSignature(
                "signature does not match identity".into(),
            ));
        }

        let mut plain = HashMap::new();
        for pair in request.handles {
            if let Some(value) = state.overrides.get(&pair.handle) {
                plain.insert(pair.handle.clone(), *value);
                continue;
            }
            if let Some((owner, value)) = state.values.get(&pair.handle) {
                if owner == request.identity {
                    plain.insert(pair.handle.clone(), *value);
                }
            }
        }
        for (handle, value) in &state.unsolicited {
            plain.insert(handle.clone(), *value);
        }
        drop(state);

        // Service side seals to the ephemeral key; client side opens.
        let mut opened = HashMap::with_capacity(plain.len());
        for (handle, value) in plain {
            let sealed = seal_to(&public_key, &value.to_be_bytes())
                .map_err(|e| CapabilityError::Unavailable(e.to_string()))?;
            let bytes = request
                .keypair
                .open(&sealed)
                .map_err(|e| CapabilityError::Unavailable(e.to_string()))?;
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes);
            opened.insert(handle, u64::from_be_bytes(word));
        }
        Ok(opened)
    }
}

#[async_trait]
impl HomomorphicEncryptionCapability for FakeService {
    async fn encrypt_value(
        &self,
        context: &EncryptionContext,
        value: u64,
    ) -> Result<EncryptedInput, CapabilityError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.mode() == ServiceMode::Unavailable {
            return Err(CapabilityError::Unavailable("service offline".into()));
        }

        let mut state = self.state.lock().unwrap();
        state.next_handle += 1;
        let handle = EncryptedKeyHandle::new(format!("0x{:064x}", state.next_handle));
        state
            .values
            .insert(handle.clone(), (context.identity.clone(), value));

        Ok(EncryptedInput {
            handle,
            proof: format!("{}:{}", context.record_space_address, context.identity).into_bytes(),
        })
    }

    async fn authorized_decrypt(
        &self,
        request: UserDecryptRequest<'_>,
    ) -> Result<HashMap<EncryptedKeyHandle, u64>, CapabilityError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            ServiceMode::Unavailable => {
                Err(CapabilityError::Unavailable("service offline".into()))
            }
            ServiceMode::Hang => std::future::pending().await,
            ServiceMode::Normal => self.answer(&request),
        }
    }
}

/// Signer that always refuses.
pub struct RejectingSigner;

#[async_trait]
impl SigningCapability for RejectingSigner {
    async fn sign_structured_message(
        &self,
        _domain: &DomainSeparator,
        _types: &TypeDescriptor,
        _message: &AuthorizationMessage,
    ) -> Result<Vec<u8>, SignerError> {
        Err(SignerError::Rejected("user rejected the request".into()))
    }
}

/// Signer that "succeeds" with no signature bytes.
pub struct EmptySigner;

#[async_trait]
impl SigningCapability for EmptySigner {
    async fn sign_structured_message(
        &self,
        _domain: &DomainSeparator,
        _types: &TypeDescriptor,
        _message: &AuthorizationMessage,
    ) -> Result<Vec<u8>, SignerError> {
        Ok(Vec::new())
    }
}

/// Wraps a real signer and counts signing requests.
pub struct CountingSigner {
    pub inner: Ed25519Signer,
    calls: AtomicUsize,
}

impl CountingSigner {
    pub fn new(inner: Ed25519Signer) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn identity(&self) -> Identity {
        self.inner.identity()
    }
}

#[async_trait]
impl SigningCapability for CountingSigner {
    async fn sign_structured_message(
        &self,
        domain: &DomainSeparator,
        types: &TypeDescriptor,
        message: &AuthorizationMessage,
    ) -> Result<Vec<u8>, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .sign_structured_message(domain, types, message)
            .await
    }
}

/// Everything a vault test needs, wired over an in-memory ledger.
pub struct Harness {
    pub vault: FileVault,
    pub service: Arc<FakeService>,
    pub signer: CountingSigner,
    pub identity: Identity,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(VaultConfig::default())
    }

    pub fn with_config(config: VaultConfig) -> Self {
        init_tracing();
        let store = Arc::new(RecordStore::new(Arc::new(MemoryLedger::new())));
        Self::with_store(config, store)
    }

    pub fn with_store(config: VaultConfig, store: Arc<RecordStore>) -> Self {
        let service = Arc::new(FakeService::new(config.clone()));
        let signer = CountingSigner::new(Ed25519Signer::generate());
        service.register(&signer.inner);
        let identity = signer.identity();
        let vault = FileVault::new(config, store, service.clone()).expect("valid config");
        Self {
            vault,
            service,
            signer,
            identity,
        }
    }

    pub fn with_key_source(self, key_source: KeySource) -> Self {
        Self {
            vault: self.vault.with_key_source(key_source),
            ..self
        }
    }

    pub fn signer(&self) -> Option<&dyn SigningCapability> {
        Some(&self.signer)
    }
}
