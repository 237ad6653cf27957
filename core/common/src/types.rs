//! Core data model: locations, encrypted records and secret buffers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Address of a record: a vault path plus a record path within that vault.
///
/// Both components are caller-chosen string keys; together they uniquely
/// identify one record per open vault handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    vault: String,
    record: String,
}

impl Location {
    /// Create a location from its two components.
    ///
    /// # Preconditions
    /// - Both components must be non-empty
    /// - Components must not contain path separators
    ///
    /// # Errors
    /// - Returns `InvalidParameters` if a component is invalid
    pub fn new(vault: impl Into<String>, record: impl Into<String>) -> crate::Result<Self> {
        let vault = vault.into();
        let record = record.into();
        for (name, value) in [("vault path", &vault), ("record path", &record)] {
            if value.is_empty() {
                return Err(crate::Error::InvalidParameters(format!(
                    "{} cannot be empty",
                    name
                )));
            }
            if value.contains('/') || value.contains('\\') {
                return Err(crate::Error::InvalidParameters(format!(
                    "{} cannot contain separators",
                    name
                )));
            }
        }
        Ok(Self { vault, record })
    }

    /// Parse a `vault/record` string into a location.
    pub fn parse(path: &str) -> crate::Result<Self> {
        match path.split_once('/') {
            Some((vault, record)) => Self::new(vault, record),
            None => Err(crate::Error::InvalidParameters(
                "location must be of the form vault/record".to_string(),
            )),
        }
    }

    /// The vault component.
    pub fn vault_path(&self) -> &str {
        &self.vault
    }

    /// The record component.
    pub fn record_path(&self) -> &str {
        &self.record
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vault, self.record)
    }
}

/// Kind of secret held by a record.
///
/// Procedures check the kind of their inputs, so a record written as one
/// kind cannot silently be consumed as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    /// 32-byte Ed25519 secret key.
    Ed25519Key,
    /// 64-byte BIP39 seed.
    Bip39Seed,
    /// Raw SLIP10 seed.
    Slip10Seed,
    /// SLIP10 derived key: 32-byte key followed by 32-byte chain code.
    Slip10Key,
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecretKind::Ed25519Key => "ed25519-key",
            SecretKind::Bip39Seed => "bip39-seed",
            SecretKind::Slip10Seed => "slip10-seed",
            SecretKind::Slip10Key => "slip10-key",
        };
        write!(f, "{}", name)
    }
}

/// One encrypted secret entry.
///
/// The payload is sealed with a per-record key and nonce; the ciphertext
/// carries the authentication tag. Records only ever hold ciphertext, so
/// they are safe to clone, serialize and hand to the snapshot collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Kind of secret stored in the payload.
    pub kind: SecretKind,
    /// Per-record AEAD nonce.
    pub nonce: Vec<u8>,
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Sensitive byte buffer that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_location_creation() {
        let loc = Location::new("vault_path", "record_path").unwrap();
        assert_eq!(loc.vault_path(), "vault_path");
        assert_eq!(loc.record_path(), "record_path");
        assert_eq!(loc.to_string(), "vault_path/record_path");
    }

    #[test]
    fn test_location_empty_component_fails() {
        assert!(Location::new("", "r").is_err());
        assert!(Location::new("v", "").is_err());
    }

    #[test]
    fn test_location_separator_fails() {
        assert!(Location::new("a/b", "r").is_err());
        assert!(Location::new("v", "a\\b").is_err());
    }

    #[test]
    fn test_location_parse() {
        let loc = Location::parse("accounts/signing-key").unwrap();
        assert_eq!(loc.vault_path(), "accounts");
        assert_eq!(loc.record_path(), "signing-key");
        assert!(Location::parse("no-separator").is_err());
    }

    #[test]
    fn test_secret_bytes_debug_redacted() {
        let secret = SecretBytes::new(vec![1, 2, 3]);
        let rendered = format!("{:?}", secret);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains('1'));
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let record = Record {
            kind: SecretKind::Ed25519Key,
            nonce: vec![7; 24],
            ciphertext: vec![9; 48],
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let restored: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
    }

    proptest! {
        #[test]
        fn prop_location_display_parse_roundtrip(
            vault in "[a-zA-Z0-9_.-]{1,16}",
            record in "[a-zA-Z0-9_.-]{1,16}",
        ) {
            let loc = Location::new(vault, record).unwrap();
            let reparsed = Location::parse(&loc.to_string()).unwrap();
            prop_assert_eq!(loc, reparsed);
        }
    }
}
