//! Public procedure outputs and the caller-facing response shape.
//!
//! An [`Output`] carries only non-secret artifacts: public keys, mnemonic
//! sentences, chain codes and signatures. Secret bytes produced by a
//! procedure are written back into the vault and never appear here.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use boltvault_common::{ErrorKind, Result};

/// Public result of a completed procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    /// The procedure succeeded without a public artifact.
    Done,
    /// An Ed25519 public key.
    PublicKey { public_key: [u8; 32] },
    /// A BIP39 mnemonic sentence.
    Mnemonic { mnemonic: String },
    /// The chain code of a SLIP10 derivation.
    ChainCode { chain_code: [u8; 32] },
    /// An Ed25519 signature.
    Signature { signature: Vec<u8> },
}

impl Output {
    /// The public key, if this output carries one.
    pub fn public_key(&self) -> Option<&[u8; 32]> {
        match self {
            Output::PublicKey { public_key } => Some(public_key),
            _ => None,
        }
    }

    /// The mnemonic sentence, if this output carries one.
    pub fn mnemonic(&self) -> Option<&str> {
        match self {
            Output::Mnemonic { mnemonic } => Some(mnemonic),
            _ => None,
        }
    }

    /// The chain code, if this output carries one.
    pub fn chain_code(&self) -> Option<&[u8; 32]> {
        match self {
            Output::ChainCode { chain_code } => Some(chain_code),
            _ => None,
        }
    }

    /// The signature, if this output carries one.
    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Output::Signature { signature } => Some(signature),
            _ => None,
        }
    }

    /// Render as named public fields. Byte outputs are base64-encoded,
    /// text outputs pass through.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        match self {
            Output::Done => {}
            Output::PublicKey { public_key } => {
                fields.insert("public_key".to_string(), STANDARD.encode(public_key));
            }
            Output::Mnemonic { mnemonic } => {
                fields.insert("mnemonic".to_string(), mnemonic.clone());
            }
            Output::ChainCode { chain_code } => {
                fields.insert("chain_code".to_string(), STANDARD.encode(chain_code));
            }
            Output::Signature { signature } => {
                fields.insert("signature".to_string(), STANDARD.encode(signature));
            }
        }
        fields
    }
}

/// Terminal status of a procedure execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Completed,
    Failed,
}

/// Caller-facing response shape, independent of transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl Response {
    /// Build a response from an execution result.
    pub fn from_result(result: &Result<Output>) -> Self {
        match result {
            Ok(output) => Self {
                status: Status::Completed,
                outputs: output.to_fields(),
                error: None,
            },
            Err(e) => Self {
                status: Status::Failed,
                outputs: BTreeMap::new(),
                error: Some(e.kind()),
            },
        }
    }

    /// Whether the procedure completed.
    pub fn success(&self) -> bool {
        self.status == Status::Completed
    }
}
