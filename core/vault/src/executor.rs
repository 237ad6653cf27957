//! Transactional procedure execution.
//!
//! One executor runs one procedure against one store. Execution follows a
//! fixed shape: lock every touched path, check declared output paths are
//! free, decrypt declared inputs, run the primitive, then commit staged
//! secret writes and hand back the public output. Any failure along the
//! way leaves the record set byte-for-byte unchanged, and every transient
//! buffer holding secret bytes zeroizes on drop regardless of the exit
//! path.

use tracing::{debug, info};
use zeroize::Zeroizing;

use boltvault_common::{Error, Result, SecretBytes, SecretKind};
use boltvault_crypto::{bip39, ed25519, slip10, SecureRng, VaultKey};

use crate::output::Output;
use crate::procedure::{KeyType, Procedure};
use crate::store::{StagedWrite, VaultStore};

/// Bounds on a generated SLIP10 seed, in bytes (128 to 512 bits).
const SLIP10_SEED_RANGE: std::ops::RangeInclusive<usize> = 16..=64;

/// Default SLIP10 seed size in bytes.
const SLIP10_SEED_DEFAULT: usize = 64;

/// Execution lifecycle of a single procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Pending,
    Executing,
    Completed,
    Failed,
}

/// Runs one procedure against a store.
pub struct ProcedureExecutor<'a> {
    store: &'a VaultStore,
    key: &'a VaultKey,
    rng: &'a dyn SecureRng,
    state: ExecutionState,
}

impl<'a> ProcedureExecutor<'a> {
    /// Create an executor in the `Pending` state.
    pub fn new(store: &'a VaultStore, key: &'a VaultKey, rng: &'a dyn SecureRng) -> Self {
        Self {
            store,
            key,
            rng,
            state: ExecutionState::Pending,
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Execute the procedure.
    ///
    /// # Postconditions
    /// - On success the state is `Completed` and all secret outputs are
    ///   committed to their declared locations
    /// - On failure the state is `Failed` and the store is unchanged
    /// - Both states are terminal; an executor runs exactly one procedure
    ///
    /// # Errors
    /// - Whatever the store or primitives raise; see the error taxonomy
    pub fn execute(&mut self, procedure: &Procedure) -> Result<Output> {
        if self.state != ExecutionState::Pending {
            return Err(Error::InvalidParameters(
                "executor has already run its procedure".to_string(),
            ));
        }
        self.state = ExecutionState::Executing;
        debug!(procedure = procedure.name(), "executing procedure");

        let result = self.run(procedure);
        match &result {
            Ok(_) => {
                self.state = ExecutionState::Completed;
                info!(procedure = procedure.name(), "procedure completed");
            }
            Err(e) => {
                self.state = ExecutionState::Failed;
                debug!(procedure = procedure.name(), error = %e, "procedure failed");
            }
        }
        result
    }

    fn run(&self, procedure: &Procedure) -> Result<Output> {
        let touched = procedure.touched();
        let _guard = self.store.lock_paths(&touched)?;

        for output in procedure.outputs() {
            if self.store.exists(output) {
                return Err(Error::PathAlreadyExists(output.clone()));
            }
        }

        let (writes, output) = self.evaluate(procedure)?;
        self.store.commit(&writes, self.key, self.rng)?;
        Ok(output)
    }

    /// Run the primitive and stage its secret products. No store mutation
    /// happens here; staged buffers zeroize on drop if anything fails.
    fn evaluate(&self, procedure: &Procedure) -> Result<(Vec<StagedWrite>, Output)> {
        match procedure {
            Procedure::GenerateKey { ty: KeyType::Ed25519, output } => {
                let secret = ed25519::generate(self.rng)?;
                let public_key = ed25519::public_key(&secret[..])?;
                let write = StagedWrite {
                    location: output.clone(),
                    kind: SecretKind::Ed25519Key,
                    plaintext: SecretBytes::new(secret.to_vec()),
                };
                Ok((vec![write], Output::PublicKey { public_key }))
            }

            Procedure::GenerateBip39 {
                entropy_bits,
                language,
                passphrase,
                output,
            } => {
                let (mnemonic, seed) =
                    bip39::generate(self.rng, *entropy_bits, *language, passphrase.as_deref())?;
                let write = StagedWrite {
                    location: output.clone(),
                    kind: SecretKind::Bip39Seed,
                    plaintext: SecretBytes::new(seed.to_vec()),
                };
                Ok((vec![write], Output::Mnemonic { mnemonic }))
            }

            Procedure::RecoverBip39 {
                mnemonic,
                language,
                passphrase,
                output,
            } => {
                let seed = bip39::recover(mnemonic, *language, passphrase.as_deref())?;
                let write = StagedWrite {
                    location: output.clone(),
                    kind: SecretKind::Bip39Seed,
                    plaintext: SecretBytes::new(seed.to_vec()),
                };
                Ok((vec![write], Output::Done))
            }

            Procedure::Slip10Generate { size_bytes, output } => {
                let size = size_bytes.unwrap_or(SLIP10_SEED_DEFAULT);
                if !SLIP10_SEED_RANGE.contains(&size) {
                    return Err(Error::InvalidParameters(format!(
                        "slip10 seed size must be between {} and {} bytes, got {}",
                        SLIP10_SEED_RANGE.start(),
                        SLIP10_SEED_RANGE.end(),
                        size
                    )));
                }
                let mut seed = Zeroizing::new(vec![0u8; size]);
                self.rng.fill(&mut seed)?;
                let write = StagedWrite {
                    location: output.clone(),
                    kind: SecretKind::Slip10Seed,
                    plaintext: SecretBytes::new(seed.to_vec()),
                };
                Ok((vec![write], Output::Done))
            }

            Procedure::Slip10Derive { source, chain, output } => {
                let (kind, plaintext) = self.store.read_secret(source, self.key)?;
                let derived = match kind {
                    SecretKind::Bip39Seed | SecretKind::Slip10Seed => {
                        slip10::derive_seed(&plaintext, chain)?
                    }
                    SecretKind::Slip10Key => {
                        let parent = slip10::DerivedKey::from_record_bytes(&plaintext)?;
                        slip10::derive_key(&parent, chain)?
                    }
                    SecretKind::Ed25519Key => {
                        return Err(Error::InvalidParameters(format!(
                            "cannot derive from a {} record",
                            kind
                        )));
                    }
                };
                let chain_code = derived.chain_code();
                let write = StagedWrite {
                    location: output.clone(),
                    kind: SecretKind::Slip10Key,
                    plaintext: SecretBytes::new(derived.to_record_bytes().to_vec()),
                };
                Ok((vec![write], Output::ChainCode { chain_code }))
            }

            Procedure::PublicKey { ty: KeyType::Ed25519, key } => {
                let (_, plaintext) = self.read_signing_key(key)?;
                let public_key = ed25519::public_key(&plaintext)?;
                Ok((Vec::new(), Output::PublicKey { public_key }))
            }

            Procedure::Sign { key, message } => {
                let (_, plaintext) = self.read_signing_key(key)?;
                let signature = ed25519::sign(&plaintext, message)?;
                Ok((
                    Vec::new(),
                    Output::Signature {
                        signature: signature.to_vec(),
                    },
                ))
            }

            Procedure::CopyRecord { source, target } => {
                let (kind, plaintext) = self.store.read_secret(source, self.key)?;
                let write = StagedWrite {
                    location: target.clone(),
                    kind,
                    plaintext: SecretBytes::new(plaintext.to_vec()),
                };
                Ok((vec![write], Output::Done))
            }
        }
    }

    /// Read a record that can act as an Ed25519 secret key. Seeds are not
    /// keys; only key records are accepted.
    fn read_signing_key(
        &self,
        location: &boltvault_common::Location,
    ) -> Result<(SecretKind, Zeroizing<Vec<u8>>)> {
        let (kind, plaintext) = self.store.read_secret(location, self.key)?;
        match kind {
            SecretKind::Ed25519Key | SecretKind::Slip10Key => Ok((kind, plaintext)),
            SecretKind::Bip39Seed | SecretKind::Slip10Seed => Err(Error::InvalidParameters(
                format!("cannot use a {} record as a signing key", kind),
            )),
        }
    }
}
