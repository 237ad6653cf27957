//! Vault session management.
//!
//! A session owns one open vault handle: the vault key, the encrypted
//! record store and the collaborator seams. Procedures run only while the
//! session is open; closing zeroizes the key, drops all records and is
//! terminal. Dropping an open session closes it.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use boltvault_common::{Error, Location, Result, SecretBytes, SecretKind};
use boltvault_crypto::{derive_key, KdfParams, Salt, SecureRng, VaultKey};
use boltvault_snapshot::SnapshotSource;

use crate::executor::ProcedureExecutor;
use crate::output::{Output, Response};
use crate::procedure::Procedure;
use crate::store::VaultStore;

/// Session handle for tracking active sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a new unique session handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// State of the vault session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session is open and procedures may run.
    Open,
    /// Session is closed; the key is zeroized. Terminal.
    Closed,
}

/// Lifecycle selection for [`ClientSession::open`].
pub enum OpenOptions {
    /// Randomly keyed, in-memory only; everything is destroyed at close.
    Ephemeral,
    /// Keyed from a passphrase; records load from the snapshot
    /// collaborator at open. Salt and KDF parameters travel with the
    /// caller's snapshot configuration.
    Persistent {
        passphrase: SecretBytes,
        salt: Salt,
        kdf_params: KdfParams,
    },
}

impl OpenOptions {
    /// Ephemeral vault options.
    pub fn ephemeral() -> Self {
        Self::Ephemeral
    }

    /// Persistent vault options.
    pub fn persistent(
        passphrase: impl Into<Vec<u8>>,
        salt: Salt,
        kdf_params: KdfParams,
    ) -> Self {
        Self::Persistent {
            passphrase: SecretBytes::new(passphrase.into()),
            salt,
            kdf_params,
        }
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenOptions::Ephemeral => write!(f, "OpenOptions::Ephemeral"),
            OpenOptions::Persistent { .. } => write!(f, "OpenOptions::Persistent([REDACTED])"),
        }
    }
}

/// An open vault handle.
///
/// `run` may be called concurrently from multiple threads; procedures on
/// disjoint paths proceed in parallel while contending ones serialize on
/// the store's path locks.
pub struct ClientSession {
    /// Unique session identifier.
    handle: SessionHandle,
    /// Encrypted record store.
    store: VaultStore,
    /// Vault key; `None` once closed.
    key: RwLock<Option<VaultKey>>,
    /// Random source for key generation and nonces.
    rng: Arc<dyn SecureRng>,
    /// Snapshot collaborator for persistent vaults.
    snapshot: Option<Arc<dyn SnapshotSource>>,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Open a vault.
    ///
    /// # Preconditions
    /// - Persistent options require a snapshot source; ephemeral options
    ///   take none
    ///
    /// # Postconditions
    /// - The session is `Open`
    /// - A persistent vault holds the record set loaded from the snapshot
    ///
    /// # Errors
    /// - `RngFailure` if no vault key could be drawn
    /// - `Snapshot`/`Serialization` if loading the record set fails
    pub fn open(
        options: OpenOptions,
        snapshot: Option<Arc<dyn SnapshotSource>>,
        rng: Arc<dyn SecureRng>,
    ) -> Result<Self> {
        let store = VaultStore::new();
        let (key, snapshot) = match options {
            OpenOptions::Ephemeral => {
                if snapshot.is_some() {
                    return Err(Error::InvalidParameters(
                        "ephemeral vaults take no snapshot source".to_string(),
                    ));
                }
                (VaultKey::generate(rng.as_ref())?, None)
            }
            OpenOptions::Persistent {
                passphrase,
                salt,
                kdf_params,
            } => {
                let snapshot = snapshot.ok_or_else(|| {
                    Error::InvalidParameters(
                        "persistent vaults require a snapshot source".to_string(),
                    )
                })?;
                let key = derive_key(passphrase.as_bytes(), &salt, &kdf_params)?;
                store.restore(snapshot.load()?);
                (key, Some(snapshot))
            }
        };

        let session = Self {
            handle: SessionHandle::new(),
            store,
            key: RwLock::new(Some(key)),
            rng,
            snapshot,
        };
        info!(
            session = session.handle.as_str(),
            persistent = session.snapshot.is_some(),
            records = session.store.len(),
            "vault opened"
        );
        Ok(session)
    }

    /// Get the session handle.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        if self.key.read().is_some() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    /// Check if the session is open.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Run a procedure against the vault.
    ///
    /// Blocking, synchronous call; usable from any concurrency model the
    /// caller chooses.
    ///
    /// # Errors
    /// - `VaultClosed` if the session is closed
    /// - Whatever the executor raises; a failed procedure leaves the
    ///   record set unchanged
    pub fn run(&self, procedure: &Procedure) -> Result<Output> {
        let key_guard = self.key.read();
        let key = key_guard.as_ref().ok_or(Error::VaultClosed)?;
        ProcedureExecutor::new(&self.store, key, self.rng.as_ref()).execute(procedure)
    }

    /// Run a procedure and shape the result as a caller-facing response.
    pub fn respond(&self, procedure: &Procedure) -> Response {
        Response::from_result(&self.run(procedure))
    }

    /// Delete the record at `location`.
    ///
    /// # Errors
    /// - `VaultClosed` if the session is closed
    /// - `PathNotFound` if no record exists at `location`
    pub fn delete(&self, location: &Location) -> Result<()> {
        self.ensure_open()?;
        self.store.delete(location)
    }

    /// Whether a record exists at `location`.
    pub fn exists(&self, location: &Location) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.store.exists(location))
    }

    /// Locations and kinds of stored records, optionally restricted to
    /// one vault path.
    pub fn list(&self, vault_path: Option<&str>) -> Result<Vec<(Location, SecretKind)>> {
        self.ensure_open()?;
        Ok(self.store.list(vault_path))
    }

    /// Serialize the current record set through the snapshot collaborator.
    ///
    /// Callers that want durability invoke this before [`close`](Self::close).
    ///
    /// # Errors
    /// - `VaultClosed` if the session is closed
    /// - `InvalidParameters` for an ephemeral vault
    pub fn produce_snapshot(&self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let snapshot = self.snapshot.as_ref().ok_or_else(|| {
            Error::InvalidParameters("ephemeral vaults cannot produce snapshots".to_string())
        })?;
        let blob = snapshot.produce(&self.store.export())?;
        debug!(session = self.handle.as_str(), size = blob.len(), "snapshot produced");
        Ok(blob)
    }

    /// Close the session, zeroizing the vault key and dropping all
    /// records. Terminal and idempotent; waits for in-flight procedures
    /// to drain.
    pub fn close(&self) {
        let mut key = self.key.write();
        if key.take().is_some() {
            // VaultKey zeroizes on drop.
            self.store.clear();
            info!(session = self.handle.as_str(), "vault closed");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.key.read().is_some() {
            Ok(())
        } else {
            Err(Error::VaultClosed)
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Status;
    use crate::procedure::KeyType;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use boltvault_crypto::{ed25519, FixedRng, OsSecureRng};
    use boltvault_snapshot::MemorySnapshot;
    use std::thread;

    fn open_ephemeral() -> ClientSession {
        ClientSession::open(OpenOptions::ephemeral(), None, Arc::new(OsSecureRng)).unwrap()
    }

    fn test_kdf_params() -> KdfParams {
        // Weak parameters to keep test derivation fast.
        KdfParams {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn generate_key_at(session: &ClientSession, vault: &str, record: &str) -> Output {
        session
            .run(&Procedure::GenerateKey {
                ty: KeyType::Ed25519,
                output: Location::new(vault, record).unwrap(),
            })
            .unwrap()
    }

    #[test]
    fn test_generate_key_reference_scenario() {
        let session = open_ephemeral();
        let response = session.respond(&Procedure::GenerateKey {
            ty: KeyType::Ed25519,
            output: Location::new("vault_path", "record_path").unwrap(),
        });

        assert!(response.success());
        assert_eq!(response.status, Status::Completed);
        assert!(response.error.is_none());

        // Exactly one public field: the base64 public key.
        assert_eq!(response.outputs.len(), 1);
        let encoded = response.outputs.get("public_key").unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap().len(), 32);

        // The secret key stayed behind in the vault.
        assert!(session
            .exists(&Location::new("vault_path", "record_path").unwrap())
            .unwrap());
    }

    #[test]
    fn test_generated_key_is_deterministic_in_rng() {
        let mut public_keys = Vec::new();
        for _ in 0..2 {
            let session = ClientSession::open(
                OpenOptions::ephemeral(),
                None,
                Arc::new(FixedRng::constant(7)),
            )
            .unwrap();
            let output = generate_key_at(&session, "vault_path", "record_path");
            public_keys.push(*output.public_key().unwrap());
        }
        assert_eq!(public_keys[0], public_keys[1]);
    }

    #[test]
    fn test_response_never_carries_secret_fields() {
        let session = open_ephemeral();
        let response = session.respond(&Procedure::GenerateKey {
            ty: KeyType::Ed25519,
            output: Location::new("v", "r").unwrap(),
        });

        let json = serde_json::to_string(&response).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let fields: Vec<&String> = value["outputs"].as_object().unwrap().keys().collect();
        assert_eq!(fields, vec!["public_key"]);
    }

    #[test]
    fn test_closed_session_refuses_everything() {
        let session = open_ephemeral();
        generate_key_at(&session, "v", "key");
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        let err = session
            .run(&Procedure::Sign {
                key: Location::new("v", "key").unwrap(),
                message: b"m".to_vec(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::VaultClosed));

        assert!(matches!(
            session.delete(&Location::new("v", "key").unwrap()),
            Err(Error::VaultClosed)
        ));
        assert!(matches!(session.list(None), Err(Error::VaultClosed)));
        assert!(matches!(session.produce_snapshot(), Err(Error::VaultClosed)));

        // Closing again is a no-op.
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_delete_list_exists() {
        let session = open_ephemeral();
        generate_key_at(&session, "accounts", "a");
        generate_key_at(&session, "accounts", "b");
        generate_key_at(&session, "other", "c");

        let listed = session.list(Some("accounts")).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|(_, kind)| *kind == SecretKind::Ed25519Key));

        let a = Location::new("accounts", "a").unwrap();
        session.delete(&a).unwrap();
        assert!(!session.exists(&a).unwrap());
        assert_eq!(session.list(Some("accounts")).unwrap().len(), 1);
    }

    #[test]
    fn test_persistent_vault_roundtrip() {
        let snapshot = Arc::new(MemorySnapshot::new());
        let salt = Salt::from_bytes([9u8; 32]);

        let public_key = {
            let session = ClientSession::open(
                OpenOptions::persistent(b"passphrase".to_vec(), salt.clone(), test_kdf_params()),
                Some(snapshot.clone()),
                Arc::new(OsSecureRng),
            )
            .unwrap();

            let output = generate_key_at(&session, "accounts", "signing");
            session.produce_snapshot().unwrap();
            session.close();
            *output.public_key().unwrap()
        };

        // Reopen from the same snapshot and sign with the restored key.
        let session = ClientSession::open(
            OpenOptions::persistent(b"passphrase".to_vec(), salt, test_kdf_params()),
            Some(snapshot),
            Arc::new(OsSecureRng),
        )
        .unwrap();

        let signed = session
            .run(&Procedure::Sign {
                key: Location::new("accounts", "signing").unwrap(),
                message: b"after reopen".to_vec(),
            })
            .unwrap();
        assert!(ed25519::verify(
            &public_key,
            b"after reopen",
            signed.signature().unwrap()
        ));
    }

    #[test]
    fn test_wrong_passphrase_fails_integrity() {
        let snapshot = Arc::new(MemorySnapshot::new());
        let salt = Salt::from_bytes([9u8; 32]);

        {
            let session = ClientSession::open(
                OpenOptions::persistent(b"correct".to_vec(), salt.clone(), test_kdf_params()),
                Some(snapshot.clone()),
                Arc::new(OsSecureRng),
            )
            .unwrap();
            generate_key_at(&session, "accounts", "signing");
            session.produce_snapshot().unwrap();
        }

        let session = ClientSession::open(
            OpenOptions::persistent(b"wrong".to_vec(), salt, test_kdf_params()),
            Some(snapshot),
            Arc::new(OsSecureRng),
        )
        .unwrap();

        let err = session
            .run(&Procedure::Sign {
                key: Location::new("accounts", "signing").unwrap(),
                message: b"m".to_vec(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed));
    }

    #[test]
    fn test_ephemeral_vault_has_no_snapshot() {
        let session = open_ephemeral();
        assert!(matches!(
            session.produce_snapshot(),
            Err(Error::InvalidParameters(_))
        ));

        let err = ClientSession::open(
            OpenOptions::ephemeral(),
            Some(Arc::new(MemorySnapshot::new())),
            Arc::new(OsSecureRng),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn test_persistent_vault_requires_snapshot() {
        let err = ClientSession::open(
            OpenOptions::persistent(b"pw".to_vec(), Salt::from_bytes([1u8; 32]), test_kdf_params()),
            None,
            Arc::new(OsSecureRng),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn test_concurrent_procedures_on_disjoint_paths() {
        let session = Arc::new(open_ephemeral());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    session.run(&Procedure::GenerateKey {
                        ty: KeyType::Ed25519,
                        output: Location::new("vault", format!("key-{}", i)).unwrap(),
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(session.list(Some("vault")).unwrap().len(), 8);
    }

    #[test]
    fn test_contending_procedures_serialize_on_one_path() {
        let session = Arc::new(open_ephemeral());
        let location = Location::new("vault", "contended").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let location = location.clone();
                thread::spawn(move || {
                    session.run(&Procedure::GenerateKey {
                        ty: KeyType::Ed25519,
                        output: location,
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::PathAlreadyExists(_))));
        assert_eq!(session.list(Some("vault")).unwrap().len(), 1);
    }

    #[test]
    fn test_drop_closes_session() {
        let session = open_ephemeral();
        generate_key_at(&session, "v", "key");
        drop(session);
        // Nothing to assert beyond not hanging; the key and records are
        // dropped and zeroized by the Drop impl.
    }
}
