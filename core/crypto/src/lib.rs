//! Cryptographic primitives for Boltvault.
//!
//! This crate provides:
//! - The secure random source seam used by every key-producing operation
//! - Vault and per-record keys with automatic zeroization
//! - Passphrase key derivation using Argon2id
//! - Authenticated record encryption using XChaCha20-Poly1305
//! - Ed25519 key generation and deterministic signing
//! - BIP39 mnemonic encoding and seed derivation
//! - SLIP10 hierarchical key derivation
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod aead;
pub mod bip39;
pub mod ed25519;
pub mod kdf;
pub mod keys;
pub mod rng;
pub mod slip10;

pub use bip39::MnemonicLanguage;
pub use kdf::{derive_key, KdfParams};
pub use keys::{RecordKey, Salt, VaultKey, KEY_LENGTH};
pub use rng::{FixedRng, OsSecureRng, SecureRng};
pub use slip10::{Chain, DerivedKey, Segment};
