//! Single-use X25519 keypairs for decryption authorization.
//!
//! Every authorization attempt generates a fresh keypair. The public half is
//! bound into the signed request; the decryption service re-encrypts the
//! recovered values to it, and the private half opens them locally. A keypair
//! is never cloned or reused across attempts.

use crate::error::{CryptoError, CryptoResult};
use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Ephemeral X25519 keypair.
///
/// The secret key implements `ZeroizeOnDrop` (from crypto_box), so dropping
/// the keypair discards the private material.
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

/// A value sealed to an ephemeral public key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedValue {
    /// Sender-side X25519 public key.
    pub sender_public_key: [u8; 32],
    /// XSalsa20 nonce (24 bytes).
    pub nonce: [u8; 24],
    /// XSalsa20-Poly1305 ciphertext + tag.
    pub ciphertext: Vec<u8>,
}

impl EphemeralKeyPair {
    /// Generates a new keypair from the OS RNG.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Returns the public key as raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Returns the public key as lowercase hex.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    /// Returns the secret key bytes, wiped when the returned buffer drops.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Opens a value sealed to this keypair's public key.
    pub fn open(&self, sealed: &SealedValue) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let sender = PublicKey::from(sealed.sender_public_key);
        let salsa_box = SalsaBox::new(&sender, &self.secret);

        salsa_box
            .decrypt(
                crypto_box::Nonce::from_slice(&sealed.nonce),
                sealed.ciphertext.as_ref(),
            )
            .map(Zeroizing::new)
            .map_err(|_| {
                CryptoError::Envelope(
                    "sealed value could not be opened (wrong key or tampered data)".to_string(),
                )
            })
    }
}

/// Seals `plaintext` to a recipient's ephemeral public key.
///
/// Used on the decryption-service side to return recovered values so that
/// only the holder of the matching [`EphemeralKeyPair`] can read them.
pub fn seal_to(recipient_public_key: &[u8; 32], plaintext: &[u8]) -> CryptoResult<SealedValue> {
    let sender = SecretKey::generate(&mut OsRng);
    let recipient = PublicKey::from(*recipient_public_key);
    let salsa_box = SalsaBox::new(&recipient, &sender);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);

    let ciphertext = salsa_box
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Envelope(format!("seal failed: {e}")))?;

    let mut nonce_bytes = [0u8; 24];
    nonce_bytes.copy_from_slice(&nonce);

    Ok(SealedValue {
        sender_public_key: *sender.public_key().as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}
