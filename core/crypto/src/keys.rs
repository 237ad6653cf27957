//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::rng::SecureRng;
use boltvault_common::Result;

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Vault-wide encryption key.
///
/// This key is the root of the key hierarchy; every record is sealed with
/// a per-record key derived from it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_LENGTH],
}

impl VaultKey {
    /// Create a vault key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Generate a random vault key.
    ///
    /// # Errors
    /// - Returns `RngFailure` if the random source fails
    pub fn generate(rng: &dyn SecureRng) -> Result<Self> {
        let mut key = [0u8; KEY_LENGTH];
        rng.fill(&mut key)?;
        Ok(Self { key })
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Derive the per-record key for a location.
    ///
    /// Uses Blake2b keyed by the vault key over the location components.
    /// Components are length-prefixed so distinct locations can never
    /// produce the same derivation input.
    pub fn derive_record_key(&self, vault_path: &[u8], record_path: &[u8]) -> RecordKey {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.key);
        hasher.update((vault_path.len() as u64).to_le_bytes());
        hasher.update(vault_path);
        hasher.update((record_path.len() as u64).to_le_bytes());
        hasher.update(record_path);
        hasher.update(b"recordkey");

        let result = hasher.finalize();
        let mut derived = [0u8; KEY_LENGTH];
        derived.copy_from_slice(&result);
        RecordKey::from_bytes(derived)
    }

    /// Constant-time equality check.
    pub fn ct_eq(&self, other: &VaultKey) -> bool {
        self.key[..].ct_eq(&other.key[..]).into()
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKey([REDACTED])")
    }
}

/// Key for sealing a single record.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecordKey {
    key: [u8; KEY_LENGTH],
}

impl RecordKey {
    /// Create a record key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey([REDACTED])")
    }
}

/// Salt for passphrase key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Generate a random salt.
    ///
    /// # Errors
    /// - Returns `RngFailure` if the random source fails
    pub fn generate(rng: &dyn SecureRng) -> Result<Self> {
        let mut salt = [0u8; 32];
        rng.fill(&mut salt)?;
        Ok(Self(salt))
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::OsSecureRng;

    #[test]
    fn test_derive_record_key_deterministic() {
        let vault_key = VaultKey::from_bytes([1u8; KEY_LENGTH]);

        let key1 = vault_key.derive_record_key(b"accounts", b"signing");
        let key2 = vault_key.derive_record_key(b"accounts", b"signing");
        assert_eq!(key1.as_bytes(), key2.as_bytes());

        let key3 = vault_key.derive_record_key(b"accounts", b"other");
        assert_ne!(key1.as_bytes(), key3.as_bytes());
    }

    #[test]
    fn test_derive_record_key_components_not_ambiguous() {
        let vault_key = VaultKey::from_bytes([1u8; KEY_LENGTH]);

        // Same concatenated bytes, different component split.
        let key1 = vault_key.derive_record_key(b"ab", b"c");
        let key2 = vault_key.derive_record_key(b"a", b"bc");
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_vault_key_generate() {
        let rng = OsSecureRng;
        let key1 = VaultKey::generate(&rng).unwrap();
        let key2 = VaultKey::generate(&rng).unwrap();
        assert!(!key1.ct_eq(&key2));
        assert!(key1.ct_eq(&key1.clone()));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = VaultKey::from_bytes([42u8; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "VaultKey([REDACTED])");
    }
}
