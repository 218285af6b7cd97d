//! Structured authorization message.
//!
//! Follows the EIP-712 layout: a domain separator, a named type with ordered
//! fields, and a message of that type. Hashing uses SHA-256 throughout:
//!
//! ```text
//! digest = H(0x19 0x01 || H(domain) || H(type_hash || encoded fields))
//! ```
//!
//! Dynamic values (`string`, `bytes`) are hashed before being concatenated,
//! arrays hash the concatenation of their element hashes, and `uint256`
//! values are 32-byte big-endian words.

use crate::config::VaultConfig;
use crate::types::ValidityWindow;
use obscura_crypto::EphemeralKeyPair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Domain separator for decryption authorizations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSeparator {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

impl DomainSeparator {
    /// The `Decryption` v1 domain on the configured chain.
    pub fn decryption(config: &VaultConfig) -> Self {
        Self {
            name: "Decryption".to_string(),
            version: "1".to_string(),
            chain_id: config.chain_id,
            verifying_contract: config.verifying_contract.clone(),
        }
    }

    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(sha256(DOMAIN_TYPE.as_bytes()));
        hasher.update(sha256(self.name.as_bytes()));
        hasher.update(sha256(self.version.as_bytes()));
        hasher.update(uint256(self.chain_id));
        hasher.update(address_word(&self.verifying_contract));
        hasher.finalize().into()
    }
}

/// One named, typed field of a structured type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    pub kind: String,
}

/// The primary type of a structured message and its ordered fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub primary_type: String,
    pub fields: Vec<TypedField>,
}

impl TypeDescriptor {
    /// `UserDecryptRequestVerification`, the type signed for a user decrypt.
    pub fn user_decrypt_request() -> Self {
        let field = |name: &str, kind: &str| TypedField {
            name: name.to_string(),
            kind: kind.to_string(),
        };
        Self {
            primary_type: "UserDecryptRequestVerification".to_string(),
            fields: vec![
                field("publicKey", "bytes"),
                field("contractAddresses", "address[]"),
                field("startTimestamp", "uint256"),
                field("durationDays", "uint256"),
                field("extraData", "bytes"),
            ],
        }
    }

    /// Canonical type string, e.g. `Name(bytes a,uint256 b)`.
    pub fn encode_type(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.kind, f.name))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({})", self.primary_type, fields)
    }

    pub fn type_hash(&self) -> [u8; 32] {
        sha256(self.encode_type().as_bytes())
    }
}

/// Message authorizing the decryption service to re-encrypt values to an
/// ephemeral public key for a limited time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    pub public_key: Vec<u8>,
    pub contract_addresses: Vec<String>,
    /// Unix seconds.
    pub start_timestamp: i64,
    pub duration_days: u32,
    pub extra_data: Vec<u8>,
}

impl AuthorizationMessage {
    pub fn new(
        keypair: &EphemeralKeyPair,
        contract_addresses: Vec<String>,
        window: &ValidityWindow,
    ) -> Self {
        Self {
            public_key: keypair.public_bytes().to_vec(),
            contract_addresses,
            start_timestamp: window.not_before.timestamp(),
            duration_days: window.duration_days,
            extra_data: Vec::new(),
        }
    }

    /// Hash of the message under `types`.
    pub fn struct_hash(&self, types: &TypeDescriptor) -> [u8; 32] {
        let mut addresses = Sha256::new();
        for address in &self.contract_addresses {
            addresses.update(address_word(address));
        }
        let addresses: [u8; 32] = addresses.finalize().into();

        let mut hasher = Sha256::new();
        hasher.update(types.type_hash());
        hasher.update(sha256(&self.public_key));
        hasher.update(addresses);
        // Start timestamps before the epoch are not meaningful; clamp to zero.
        hasher.update(uint256(u64::try_from(self.start_timestamp).unwrap_or(0)));
        hasher.update(uint256(u64::from(self.duration_days)));
        hasher.update(sha256(&self.extra_data));
        hasher.finalize().into()
    }
}

/// Digest that a signing capability signs and a verifier checks.
pub fn signing_digest(
    domain: &DomainSeparator,
    types: &TypeDescriptor,
    message: &AuthorizationMessage,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x19, 0x01]);
    hasher.update(domain.hash());
    hasher.update(message.struct_hash(types));
    hasher.finalize().into()
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn uint256(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Addresses compare case-insensitively, so they are hashed lowercased.
fn address_word(address: &str) -> [u8; 32] {
    sha256(address.to_ascii_lowercase().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message() -> AuthorizationMessage {
        AuthorizationMessage {
            public_key: vec![7u8; 32],
            contract_addresses: vec!["0xAbC".to_string()],
            start_timestamp: 1_700_000_000,
            duration_days: 7,
            extra_data: Vec::new(),
        }
    }

    #[test]
    fn user_decrypt_type_string() {
        assert_eq!(
            TypeDescriptor::user_decrypt_request().encode_type(),
            "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,\
             uint256 startTimestamp,uint256 durationDays,bytes extraData)"
        );
    }

    #[test]
    fn digest_binds_every_field() {
        let domain = DomainSeparator::decryption(&VaultConfig::default());
        let types = TypeDescriptor::user_decrypt_request();
        let base = signing_digest(&domain, &types, &message());

        let mut m = message();
        m.duration_days = 8;
        assert_ne!(signing_digest(&domain, &types, &m), base);

        let mut m = message();
        m.public_key[0] ^= 1;
        assert_ne!(signing_digest(&domain, &types, &m), base);

        let mut m = message();
        m.start_timestamp += 1;
        assert_ne!(signing_digest(&domain, &types, &m), base);

        let mut other = domain.clone();
        other.chain_id += 1;
        assert_ne!(signing_digest(&other, &types, &message()), base);
    }

    #[test]
    fn address_case_does_not_change_digest() {
        let domain = DomainSeparator::decryption(&VaultConfig::default());
        let types = TypeDescriptor::user_decrypt_request();
        let mut upper = message();
        upper.contract_addresses = vec!["0xABC".to_string()];
        assert_eq!(
            signing_digest(&domain, &types, &message()),
            signing_digest(&domain, &types, &upper)
        );
    }

    #[test]
    fn message_from_window() {
        let keypair = EphemeralKeyPair::generate();
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let window = ValidityWindow::new(start, 10, 365).unwrap();
        let msg = AuthorizationMessage::new(&keypair, vec!["0x1".into()], &window);

        assert_eq!(msg.public_key, keypair.public_bytes().to_vec());
        assert_eq!(msg.start_timestamp, start.timestamp());
        assert_eq!(msg.duration_days, 10);
        assert!(msg.extra_data.is_empty());
    }
}
