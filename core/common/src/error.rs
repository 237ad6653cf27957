//! Common error types for Boltvault.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Location;

/// Top-level error type for vault operations.
///
/// Error messages carry locations, parameter names and sizes only; no
/// variant ever embeds key material, plaintext or mnemonic words.
#[derive(Debug, Error)]
pub enum Error {
    /// No record exists at the addressed location.
    #[error("no record at {0}")]
    PathNotFound(Location),

    /// A record already exists at the addressed location and overwriting
    /// was not requested.
    #[error("record already exists at {0}")]
    PathAlreadyExists(Location),

    /// A record failed authentication during decryption. The vault must be
    /// treated as compromised; the store latches into a failed state and
    /// refuses further operations instead of retrying.
    #[error("record integrity check failed")]
    DecryptionFailed,

    /// A procedure was invoked with unsupported or malformed parameters.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A path lock could not be acquired within the bounded wait. The
    /// caller may retry; the core never retries on its own.
    #[error("vault busy: {0}")]
    VaultBusy(String),

    /// The secure random source failed. Fatal for the operation; never
    /// substituted with a weaker source.
    #[error("random source failure: {0}")]
    RngFailure(String),

    /// The session was closed before the operation was attempted.
    #[error("vault is closed")]
    VaultClosed,

    /// Cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Snapshot collaborator failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Classify this error for the caller-facing response shape.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PathNotFound(_) => ErrorKind::PathNotFound,
            Error::PathAlreadyExists(_) => ErrorKind::PathAlreadyExists,
            Error::DecryptionFailed => ErrorKind::DecryptionFailed,
            Error::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Error::VaultBusy(_) => ErrorKind::VaultBusy,
            Error::RngFailure(_) => ErrorKind::RngFailure,
            Error::VaultClosed => ErrorKind::VaultClosed,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Snapshot(_) => ErrorKind::Snapshot,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the caller may usefully retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VaultBusy(_))
    }
}

/// Wire-safe error discriminant carried in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PathNotFound,
    PathAlreadyExists,
    DecryptionFailed,
    InvalidParameters,
    VaultBusy,
    RngFailure,
    VaultClosed,
    Crypto,
    Snapshot,
    Serialization,
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
