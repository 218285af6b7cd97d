//! Content-addressable upload.

use crate::error::VaultResult;
use crate::types::ContentAddress;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const CID_PREFIX: &str = "bafy";
const CID_BODY_LEN: usize = 52;

/// Stores bytes somewhere addressable by content and returns the address.
#[async_trait]
pub trait ContentAddressableUpload: Send + Sync {
    async fn upload(&self, bytes: &[u8]) -> VaultResult<ContentAddress>;
}

/// Uploader that stores nothing and returns a random CID-shaped address
/// after a short delay.
#[derive(Clone, Debug)]
pub struct MockUpload {
    latency: Duration,
}

impl MockUpload {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(800),
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for MockUpload {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentAddressableUpload for MockUpload {
    async fn upload(&self, bytes: &[u8]) -> VaultResult<ContentAddress> {
        tokio::time::sleep(self.latency).await;
        let address = mock_content_address();
        debug!(
            "mock upload of {} -> {address}",
            human_readable_size(bytes.len() as u64)
        );
        Ok(address)
    }
}

fn mock_content_address() -> ContentAddress {
    let mut rng = rand::thread_rng();
    let body: String = (0..CID_BODY_LEN)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect();
    format!("{CID_PREFIX}{body}")
}

/// Formats a byte count with one decimal: `"512.0 B"`, `"1.5 KB"`.
///
/// Units stop at GB.
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
