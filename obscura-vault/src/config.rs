//! Vault configuration.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound accepted for `max_validity_days` (about a century).
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Configuration for the file vault and its authorization protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Address of the record space that owns the encrypted key handles.
    /// Bound into every encryption context and authorization message.
    pub record_space_address: String,

    /// Chain identifier placed in the authorization domain separator.
    pub chain_id: u64,

    /// Verifying contract placed in the authorization domain separator.
    pub verifying_contract: String,

    /// Validity window used by `reveal_file`, in days.
    pub default_validity_days: u32,

    /// Longest window the decryption service accepts, in days.
    pub max_validity_days: u32,

    /// Upper bound on one authorization round trip (seconds).
    pub authorization_timeout_secs: u64,

    /// Refuse secret keys generated from the time-based fallback.
    pub require_os_entropy: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            record_space_address: "0xb9E4461f76B94e97717bEaCE39A8D223Bd7201d9".to_string(),
            chain_id: 11_155_111, // Sepolia
            verifying_contract: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1".to_string(),
            default_validity_days: 7,
            max_validity_days: 365,
            authorization_timeout_secs: 30,
            require_os_entropy: true,
        }
    }
}

impl VaultConfig {
    /// Creates a config for tests: short timeout, test addresses.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            record_space_address: "0x00000000000000000000000000000000000000aa".to_string(),
            verifying_contract: "0x00000000000000000000000000000000000000bb".to_string(),
            chain_id: 31_337,
            authorization_timeout_secs: 1,
            ..Self::default()
        }
    }

    /// Checks the configuration for values the vault cannot operate with.
    pub fn validate(&self) -> VaultResult<()> {
        if self.record_space_address.trim().is_empty() {
            return Err(VaultError::Config(
                "record_space_address must not be empty".into(),
            ));
        }
        if self.verifying_contract.trim().is_empty() {
            return Err(VaultError::Config(
                "verifying_contract must not be empty".into(),
            ));
        }
        if self.max_validity_days == 0 {
            return Err(VaultError::Config(
                "max_validity_days must be at least 1".into(),
            ));
        }
        if self.max_validity_days > MAX_VALIDITY_DAYS {
            return Err(VaultError::Config(format!(
                "max_validity_days must be at most {MAX_VALIDITY_DAYS}, got {}",
                self.max_validity_days
            )));
        }
        if self.default_validity_days == 0 || self.default_validity_days > self.max_validity_days
        {
            return Err(VaultError::Config(format!(
                "default_validity_days must be in 1..={}, got {}",
                self.max_validity_days, self.default_validity_days
            )));
        }
        if self.authorization_timeout_secs == 0 {
            return Err(VaultError::Config(
                "authorization_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Timeout applied to the authorized-decrypt round trip.
    pub fn authorization_timeout(&self) -> Duration {
        Duration::from_secs(self.authorization_timeout_secs)
    }
}
