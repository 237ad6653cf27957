//! Passphrase key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. Persistent
//! vaults derive their vault key from the caller-supplied passphrase with
//! the parameters recorded alongside the snapshot.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{Salt, VaultKey, KEY_LENGTH};
use boltvault_common::{Error, Result};

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// These parameters provide a balance between security and usability,
    /// targeting approximately 0.5-1 second of derivation time.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    ///
    /// Higher security parameters that may take several seconds.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for constrained devices.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a vault key from a passphrase and salt using Argon2id.
///
/// # Preconditions
/// - `passphrase` must not be empty
/// - `params` must have valid Argon2id parameters
///
/// # Postconditions
/// - Returns a VaultKey derived from the passphrase
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns `InvalidParameters` if passphrase is empty
/// - Returns `Crypto` if Argon2id parameters are invalid
///
/// # Security
/// - Passphrase is not stored or logged
pub fn derive_key(passphrase: &[u8], salt: &Salt, params: &KdfParams) -> Result<VaultKey> {
    if passphrase.is_empty() {
        return Err(Error::InvalidParameters(
            "passphrase cannot be empty".to_string(),
        ));
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("key derivation failed: {}", e)))?;

    Ok(VaultKey::from_bytes(key_bytes))
}
