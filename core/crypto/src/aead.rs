//! Authenticated record encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity, with
//! a 24-byte nonce that is safe for random generation. Every record is
//! sealed under its own freshly drawn nonce, so records sharing one vault
//! key never reuse a (key, nonce) pair, and the record's location is bound
//! in as associated data so a ciphertext moved to another path fails
//! authentication.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::keys::RecordKey;
use crate::rng::SecureRng;
use boltvault_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Draw a fresh random nonce.
///
/// # Errors
/// - Returns `RngFailure` if the random source fails
pub fn generate_nonce(rng: &dyn SecureRng) -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce)?;
    Ok(nonce)
}

/// Encrypt plaintext under a record key and explicit nonce.
///
/// # Preconditions
/// - `nonce` must be unique for this key
///
/// # Postconditions
/// - Returns ciphertext with the authentication tag appended
/// - The associated data must be presented unchanged to [`open`]
///
/// # Errors
/// - Returns `Crypto` if encryption fails
pub fn seal(
    key: &RecordKey,
    nonce: &[u8; NONCE_SIZE],
    associated_data: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .encrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|_| Error::Crypto("record encryption failed".to_string()))
}

/// Decrypt and authenticate a sealed record payload.
///
/// # Postconditions
/// - Returns the plaintext in a zeroize-on-drop buffer
/// - Authentication covers ciphertext, nonce and associated data
///
/// # Errors
/// - Returns `DecryptionFailed` on any authentication failure, including a
///   malformed nonce or truncated ciphertext. Callers must treat this as
///   fatal for the vault.
pub fn open(
    key: &RecordKey,
    nonce: &[u8],
    associated_data: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_SIZE || ciphertext.len() < TAG_SIZE {
        return Err(Error::DecryptionFailed);
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: associated_data,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| Error::DecryptionFailed)
}
