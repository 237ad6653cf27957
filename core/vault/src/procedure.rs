//! Procedure requests: the closed set of operations a vault can run.
//!
//! Each variant declares which vault locations it reads and which it
//! writes; the executor uses those declarations for locking, existence
//! checks and failure atomicity. Adding a variant is a compile-checked
//! change: every match over [`Procedure`] is exhaustive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use boltvault_common::Location;
use boltvault_crypto::{Chain, MnemonicLanguage};

/// Supported key schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Ed25519,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Ed25519 => write!(f, "ed25519"),
        }
    }
}

/// A requested cryptographic operation.
#[derive(Clone, Serialize, Deserialize)]
pub enum Procedure {
    /// Generate a fresh secret key at `output`; returns the public key.
    GenerateKey { ty: KeyType, output: Location },
    /// Generate a BIP39 seed at `output`; returns the mnemonic sentence.
    GenerateBip39 {
        entropy_bits: u32,
        language: MnemonicLanguage,
        passphrase: Option<String>,
        output: Location,
    },
    /// Re-create the seed for an existing mnemonic sentence at `output`.
    RecoverBip39 {
        mnemonic: String,
        language: MnemonicLanguage,
        passphrase: Option<String>,
        output: Location,
    },
    /// Generate a raw SLIP10 seed at `output`.
    Slip10Generate {
        size_bytes: Option<usize>,
        output: Location,
    },
    /// Derive a SLIP10 child key from the seed or parent key at `source`;
    /// returns the chain code.
    Slip10Derive {
        source: Location,
        chain: Chain,
        output: Location,
    },
    /// Derive the public key of the secret key at `key`.
    PublicKey { ty: KeyType, key: Location },
    /// Sign `message` with the secret key at `key`.
    Sign { key: Location, message: Vec<u8> },
    /// Copy the record at `source` to `target`.
    CopyRecord { source: Location, target: Location },
}

impl Procedure {
    /// Stable procedure name, for diagnostics and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Procedure::GenerateKey { .. } => "generate-key",
            Procedure::GenerateBip39 { .. } => "generate-bip39",
            Procedure::RecoverBip39 { .. } => "recover-bip39",
            Procedure::Slip10Generate { .. } => "slip10-generate",
            Procedure::Slip10Derive { .. } => "slip10-derive",
            Procedure::PublicKey { .. } => "public-key",
            Procedure::Sign { .. } => "sign",
            Procedure::CopyRecord { .. } => "copy-record",
        }
    }

    /// Locations this procedure reads from the vault.
    pub fn inputs(&self) -> Vec<&Location> {
        match self {
            Procedure::GenerateKey { .. }
            | Procedure::GenerateBip39 { .. }
            | Procedure::RecoverBip39 { .. }
            | Procedure::Slip10Generate { .. } => Vec::new(),
            Procedure::Slip10Derive { source, .. } => vec![source],
            Procedure::PublicKey { key, .. } => vec![key],
            Procedure::Sign { key, .. } => vec![key],
            Procedure::CopyRecord { source, .. } => vec![source],
        }
    }

    /// Locations this procedure writes secret outputs to.
    pub fn outputs(&self) -> Vec<&Location> {
        match self {
            Procedure::GenerateKey { output, .. }
            | Procedure::GenerateBip39 { output, .. }
            | Procedure::RecoverBip39 { output, .. }
            | Procedure::Slip10Generate { output, .. }
            | Procedure::Slip10Derive { output, .. } => vec![output],
            Procedure::PublicKey { .. } | Procedure::Sign { .. } => Vec::new(),
            Procedure::CopyRecord { target, .. } => vec![target],
        }
    }

    /// Every location the procedure touches, for lock acquisition.
    pub(crate) fn touched(&self) -> BTreeSet<Location> {
        self.inputs()
            .into_iter()
            .chain(self.outputs())
            .cloned()
            .collect()
    }
}

// Procedures can carry mnemonics and passphrases; the derived Debug would
// print them. Only names and locations are rendered.
impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.name());
        for location in self.inputs() {
            s.field("input", &location.to_string());
        }
        for location in self.outputs() {
            s.field("output", &location.to_string());
        }
        s.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(record: &str) -> Location {
        Location::new("vault", record).unwrap()
    }

    #[test]
    fn test_declared_inputs_and_outputs() {
        let derive = Procedure::Slip10Derive {
            source: loc("seed"),
            chain: Chain::from_hardened([0]),
            output: loc("child"),
        };
        assert_eq!(derive.inputs(), vec![&loc("seed")]);
        assert_eq!(derive.outputs(), vec![&loc("child")]);
        assert_eq!(derive.touched().len(), 2);

        let sign = Procedure::Sign {
            key: loc("key"),
            message: b"m".to_vec(),
        };
        assert_eq!(sign.inputs(), vec![&loc("key")]);
        assert!(sign.outputs().is_empty());
    }

    #[test]
    fn test_debug_redacts_sentence_and_passphrase() {
        let procedure = Procedure::RecoverBip39 {
            mnemonic: "legal winner thank year wave".to_string(),
            language: MnemonicLanguage::English,
            passphrase: Some("hunter2".to_string()),
            output: loc("seed"),
        };
        let rendered = format!("{:?}", procedure);
        assert!(rendered.contains("recover-bip39"));
        assert!(!rendered.contains("winner"));
        assert!(!rendered.contains("hunter2"));
    }
}
