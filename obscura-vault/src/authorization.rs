//! Signed, time-limited recovery of secret keys.
//!
//! Every call to [`AuthorizationProtocol::authorize_and_decrypt`] runs one
//! attempt:
//!
//! ```text
//! Idle -> KeypairGenerated -> MessageBuilt -> Signed -> Submitted -> Fulfilled
//!                                                                 -> Denied
//!   any step ------------------------------------------------------> Failed
//! ```
//!
//! An attempt generates its own ephemeral keypair and signs a fresh
//! message. Nothing is cached between attempts; the grant is dropped as soon
//! as the round trip returns.

use crate::capability::{
    CapabilityError, HandleContractPair, HomomorphicEncryptionCapability, UserDecryptRequest,
};
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::signer::SigningCapability;
use crate::typed_data::{AuthorizationMessage, DomainSeparator, TypeDescriptor};
use crate::types::ValidityWindow;
use obscura_crypto::{CryptoError, EphemeralKeyPair, SecretKey};
use obscura_storage::{EncryptedKeyHandle, Identity};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Progress of one authorization attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationState {
    Idle,
    KeypairGenerated,
    MessageBuilt,
    Signed,
    Submitted,
    /// At least one requested handle was returned.
    Fulfilled,
    /// The service answered but returned none of the requested handles.
    Denied,
    Failed,
}

impl AuthorizationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Fulfilled | Self::Denied | Self::Failed)
    }
}

/// Ephemeral material and signature for one decryption attempt.
///
/// Created per attempt, used once, never persisted. Not `Clone`; the
/// ephemeral secret is wiped when the grant drops.
struct DecryptionGrant {
    keypair: EphemeralKeyPair,
    window: ValidityWindow,
    message: AuthorizationMessage,
    signature: Vec<u8>,
}

impl DecryptionGrant {
    fn request<'a>(
        &'a self,
        identity: &'a Identity,
        handles: &'a [HandleContractPair],
    ) -> UserDecryptRequest<'a> {
        UserDecryptRequest {
            handles,
            keypair: &self.keypair,
            signature: &self.signature,
            contract_addresses: &self.message.contract_addresses,
            identity,
            window: self.window,
        }
    }
}

#[derive(Debug)]
enum KeyStatus {
    Granted(SecretKey),
    Denied,
    /// The service returned a value that is not a valid secret key.
    Malformed(String),
}

/// Per-handle results of an authorization attempt.
#[derive(Debug)]
pub struct DecryptionOutcome {
    state: AuthorizationState,
    order: Vec<EncryptedKeyHandle>,
    results: HashMap<EncryptedKeyHandle, KeyStatus>,
}

impl DecryptionOutcome {
    fn empty() -> Self {
        Self {
            state: AuthorizationState::Idle,
            order: Vec::new(),
            results: HashMap::new(),
        }
    }

    /// Final state of the attempt: `Fulfilled`, `Denied`, or `Idle` for an
    /// empty request.
    pub fn state(&self) -> AuthorizationState {
        self.state
    }

    /// Recovered key for `handle`.
    pub fn key(&self, handle: &EncryptedKeyHandle) -> Option<&SecretKey> {
        match self.results.get(handle) {
            Some(KeyStatus::Granted(key)) => Some(key),
            _ => None,
        }
    }

    /// Result for `handle`: its key, `InvalidKeyFormat`, or
    /// `DecryptionDenied` (also for handles never requested).
    pub fn result(&self, handle: &EncryptedKeyHandle) -> VaultResult<SecretKey> {
        match self.results.get(handle) {
            Some(KeyStatus::Granted(key)) => Ok(key.clone()),
            Some(KeyStatus::Malformed(msg)) => Err(VaultError::InvalidKeyFormat(msg.clone())),
            Some(KeyStatus::Denied) | None => Err(VaultError::DecryptionDenied {
                handle: handle.clone(),
            }),
        }
    }

    /// Like [`result`](Self::result) but moves the key out, leaving the
    /// handle denied.
    pub fn take(&mut self, handle: &EncryptedKeyHandle) -> VaultResult<SecretKey> {
        match self.results.remove(handle) {
            Some(KeyStatus::Granted(key)) => Ok(key),
            Some(KeyStatus::Malformed(msg)) => Err(VaultError::InvalidKeyFormat(msg)),
            Some(KeyStatus::Denied) | None => Err(VaultError::DecryptionDenied {
                handle: handle.clone(),
            }),
        }
    }

    pub fn is_granted(&self, handle: &EncryptedKeyHandle) -> bool {
        self.key(handle).is_some()
    }

    /// Requested handles, deduplicated, in request order.
    pub fn handles(&self) -> &[EncryptedKeyHandle] {
        &self.order
    }

    /// Handles whose key was not recovered, in request order.
    pub fn denied(&self) -> Vec<&EncryptedKeyHandle> {
        self.order.iter().filter(|h| !self.is_granted(h)).collect()
    }

    pub fn granted_count(&self) -> usize {
        self.results
            .values()
            .filter(|s| matches!(s, KeyStatus::Granted(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct Attempt<'a> {
    identity: &'a Identity,
    state: AuthorizationState,
}

impl<'a> Attempt<'a> {
    fn new(identity: &'a Identity) -> Self {
        Self {
            identity,
            state: AuthorizationState::Idle,
        }
    }

    fn advance(&mut self, next: AuthorizationState) {
        debug!(
            "authorization for {}: {:?} -> {:?}",
            self.identity, self.state, next
        );
        self.state = next;
    }

    fn fail(&mut self, err: VaultError) -> VaultError {
        warn!("authorization for {} failed: {err}", self.identity);
        self.advance(AuthorizationState::Failed);
        err
    }
}

/// Runs authorization attempts against a homomorphic encryption service.
pub struct AuthorizationProtocol {
    capability: Arc<dyn HomomorphicEncryptionCapability>,
    config: VaultConfig,
}

impl AuthorizationProtocol {
    pub fn new(capability: Arc<dyn HomomorphicEncryptionCapability>, config: VaultConfig) -> Self {
        Self { capability, config }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Recovers the secret keys behind `handles` on behalf of `identity`.
    ///
    /// Asks `signer` for one signature and makes one round trip to the
    /// service, bounded by the configured timeout. Handles the service
    /// leaves out of its answer are denied individually.
    pub async fn authorize_and_decrypt(
        &self,
        identity: &Identity,
        handles: &[EncryptedKeyHandle],
        signer: Option<&dyn SigningCapability>,
        duration_days: u32,
    ) -> VaultResult<DecryptionOutcome> {
        let window = ValidityWindow::starting_now(duration_days, self.config.max_validity_days)?;
        let requested = dedup(handles);
        if requested.is_empty() {
            return Ok(DecryptionOutcome::empty());
        }
        let signer = signer.ok_or(VaultError::SignerUnavailable)?;

        let mut attempt = Attempt::new(identity);

        let keypair = EphemeralKeyPair::generate();
        attempt.advance(AuthorizationState::KeypairGenerated);

        let contract_addresses = vec![self.config.record_space_address.clone()];
        let domain = DomainSeparator::decryption(&self.config);
        let types = TypeDescriptor::user_decrypt_request();
        let message = AuthorizationMessage::new(&keypair, contract_addresses, &window);
        attempt.advance(AuthorizationState::MessageBuilt);

        let signature = match signer.sign_structured_message(&domain, &types, &message).await {
            Ok(sig) if sig.is_empty() => {
                return Err(attempt.fail(VaultError::SignatureFailed(
                    "signer returned an empty signature".into(),
                )));
            }
            Ok(sig) => sig,
            Err(e) => return Err(attempt.fail(VaultError::SignatureFailed(e.to_string()))),
        };
        attempt.advance(AuthorizationState::Signed);

        let grant = DecryptionGrant {
            keypair,
            window,
            message,
            signature,
        };
        let pairs: Vec<HandleContractPair> = requested
            .iter()
            .map(|handle| HandleContractPair {
                handle: handle.clone(),
                contract_address: self.config.record_space_address.clone(),
            })
            .collect();

        attempt.advance(AuthorizationState::Submitted);
        let timeout = self.config.authorization_timeout();
        let response = tokio::time::timeout(
            timeout,
            self.capability
                .authorized_decrypt(grant.request(identity, &pairs)),
        )
        .await;
        drop(grant);

        let mut values = match response {
            Err(_) => {
                return Err(attempt.fail(VaultError::AuthorizationServiceUnavailable(format!(
                    "no answer within {}s",
                    timeout.as_secs()
                ))));
            }
            Ok(Err(e)) => return Err(attempt.fail(map_capability_error(e))),
            Ok(Ok(values)) => values,
        };

        let mut results = HashMap::with_capacity(requested.len());
        for handle in &requested {
            let status = match values.remove(handle).map(SecretKey::from_u64) {
                Some(Ok(key)) => KeyStatus::Granted(key),
                Some(Err(e)) => {
                    warn!("authorization for {identity}: bad value for {handle}: {e}");
                    KeyStatus::Malformed(match e {
                        CryptoError::InvalidKeyFormat(msg) => msg,
                        other => other.to_string(),
                    })
                }
                None => KeyStatus::Denied,
            };
            results.insert(handle.clone(), status);
        }
        if !values.is_empty() {
            warn!(
                "authorization for {identity}: ignoring {} value(s) for handles not requested",
                values.len()
            );
        }

        let granted = results
            .values()
            .any(|s| matches!(s, KeyStatus::Granted(_)));
        attempt.advance(if granted {
            AuthorizationState::Fulfilled
        } else {
            AuthorizationState::Denied
        });

        Ok(DecryptionOutcome {
            state: attempt.state,
            order: requested,
            results,
        })
    }
}

fn map_capability_error(err: CapabilityError) -> VaultError {
    match err {
        CapabilityError::Unavailable(msg) => VaultError::AuthorizationServiceUnavailable(msg),
        CapabilityError::InvalidSignature(msg) => VaultError::SignatureFailed(msg),
        CapabilityError::InvalidWindow(msg) => VaultError::InvalidGrantWindow(msg),
    }
}

fn dedup(handles: &[EncryptedKeyHandle]) -> Vec<EncryptedKeyHandle> {
    let mut seen = HashSet::with_capacity(handles.len());
    handles
        .iter()
        .filter(|h| seen.insert(*h))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let h = |s: &str| EncryptedKeyHandle::new(s);
        let out = dedup(&[h("b"), h("a"), h("b"), h("c"), h("a")]);
        assert_eq!(out, vec![h("b"), h("a"), h("c")]);
    }

    #[test]
    fn terminal_states() {
        assert!(AuthorizationState::Fulfilled.is_terminal());
        assert!(AuthorizationState::Denied.is_terminal());
        assert!(AuthorizationState::Failed.is_terminal());
        assert!(!AuthorizationState::Submitted.is_terminal());
    }

    #[test]
    fn empty_outcome_denies_everything() {
        let mut outcome = DecryptionOutcome::empty();
        let handle = EncryptedKeyHandle::new("0x01");
        assert!(outcome.is_empty());
        assert!(!outcome.is_granted(&handle));
        assert!(matches!(
            outcome.take(&handle),
            Err(VaultError::DecryptionDenied { .. })
        ));
    }
}
