//! Ed25519 key generation and deterministic signing.
//!
//! Thin wrappers around `ed25519-dalek`, which performs scalar arithmetic
//! in constant time and zeroizes signing keys on drop. Key material enters
//! and leaves these functions as raw bytes so the vault can keep it inside
//! zeroizing buffers.
//!
//! Any record whose first 32 bytes are key material can act as a signing
//! key; in particular SLIP10 derived keys are compatible.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

use crate::rng::SecureRng;
use boltvault_common::{Error, Result};

/// Length of an Ed25519 secret key in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

fn signing_key(secret: &[u8]) -> Result<SigningKey> {
    if secret.len() < SECRET_KEY_LENGTH {
        return Err(Error::InvalidParameters(format!(
            "ed25519 secret key needs {} bytes, record holds {}",
            SECRET_KEY_LENGTH,
            secret.len()
        )));
    }
    let mut bytes = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    bytes.copy_from_slice(&secret[..SECRET_KEY_LENGTH]);
    Ok(SigningKey::from_bytes(&bytes))
}

/// Generate a fresh Ed25519 secret key.
///
/// Draws exactly [`SECRET_KEY_LENGTH`] bytes from the random source.
///
/// # Errors
/// - Returns `RngFailure` if the random source fails
pub fn generate(rng: &dyn SecureRng) -> Result<Zeroizing<[u8; SECRET_KEY_LENGTH]>> {
    let mut secret = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    rng.fill(secret.as_mut())?;
    Ok(secret)
}

/// Derive the public key for a secret key.
///
/// # Errors
/// - Returns `InvalidParameters` if `secret` is shorter than a key
pub fn public_key(secret: &[u8]) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
    let sk = signing_key(secret)?;
    Ok(sk.verifying_key().to_bytes())
}

/// Sign a message with a secret key.
///
/// Ed25519 signing is deterministic; no per-call randomness is drawn.
///
/// # Errors
/// - Returns `InvalidParameters` if `secret` is shorter than a key
pub fn sign(secret: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
    let sk = signing_key(secret)?;
    Ok(sk.sign(message).to_bytes())
}

/// Verify a signature against a public key.
pub fn verify(public: &[u8; PUBLIC_KEY_LENGTH], message: &[u8], signature: &[u8]) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(public) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    vk.verify(message, &Signature::from_bytes(&sig_bytes)).is_ok()
}
