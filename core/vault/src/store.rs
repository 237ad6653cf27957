//! Encrypted, path-addressed record store.
//!
//! Every record is sealed under a per-record key derived from the vault
//! key, with a fresh nonce, and authenticated with the record's location
//! as associated data. The store owns ciphertext only; plaintext exists
//! solely in the zeroizing buffers of the caller that sealed or opened it.
//!
//! Concurrency follows a per-path discipline: procedures lock every path
//! they touch before running, disjoint path sets proceed in parallel and
//! contending ones serialize. Lock waits are bounded; exceeding the bound
//! fails with `VaultBusy` and is left to the caller to retry.

use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use boltvault_common::{Error, Location, Record, Result, SecretBytes, SecretKind};
use boltvault_crypto::{aead, SecureRng, VaultKey};

/// Default bound on path lock waits.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A buffered secret write, sealed and applied only at commit.
pub(crate) struct StagedWrite {
    pub location: Location,
    pub kind: SecretKind,
    pub plaintext: SecretBytes,
}

/// Encrypted record store for one vault.
pub struct VaultStore {
    /// Record set, ciphertext only.
    records: RwLock<HashMap<Location, Record>>,
    /// Paths currently locked by in-flight procedures.
    held: Mutex<BTreeSet<Location>>,
    /// Signalled whenever paths are released.
    released: Condvar,
    /// Bound on lock acquisition waits.
    lock_timeout: Duration,
    /// Latched on the first integrity failure; the store refuses all
    /// further operations once set.
    compromised: AtomicBool,
}

impl VaultStore {
    /// Create an empty store with the default lock timeout.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store with an explicit lock timeout.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            held: Mutex::new(BTreeSet::new()),
            released: Condvar::new(),
            lock_timeout,
            compromised: AtomicBool::new(false),
        }
    }

    fn ensure_intact(&self) -> Result<()> {
        if self.compromised.load(Ordering::Acquire) {
            return Err(Error::DecryptionFailed);
        }
        Ok(())
    }

    fn flag_compromised(&self) {
        warn!("record integrity failure, store locked down");
        self.compromised.store(true, Ordering::Release);
    }

    /// Encrypt and store a secret under `location`.
    ///
    /// # Postconditions
    /// - The record is sealed under a freshly drawn nonce
    /// - With `overwrite` false an existing record is left untouched
    ///
    /// # Errors
    /// - `PathAlreadyExists` if `location` is taken and `overwrite` is false
    /// - `RngFailure` if no nonce could be drawn
    pub fn write_secret(
        &self,
        location: &Location,
        kind: SecretKind,
        plaintext: &[u8],
        overwrite: bool,
        key: &VaultKey,
        rng: &dyn SecureRng,
    ) -> Result<()> {
        self.ensure_intact()?;
        let record = seal_record(key, rng, location, kind, plaintext)?;

        let mut records = self.records.write();
        if !overwrite && records.contains_key(location) {
            return Err(Error::PathAlreadyExists(location.clone()));
        }
        records.insert(location.clone(), record);
        drop(records);

        debug!(%location, kind = %kind, "record written");
        Ok(())
    }

    /// Decrypt and authenticate the record at `location`.
    ///
    /// The plaintext handle is for internal use by the executor; it never
    /// crosses the vault boundary.
    ///
    /// # Errors
    /// - `PathNotFound` if no record exists at `location`
    /// - `DecryptionFailed` on integrity failure; the store latches into a
    ///   compromised state and refuses further operations
    pub fn read_secret(
        &self,
        location: &Location,
        key: &VaultKey,
    ) -> Result<(SecretKind, Zeroizing<Vec<u8>>)> {
        self.ensure_intact()?;
        let records = self.records.read();
        let record = records
            .get(location)
            .ok_or_else(|| Error::PathNotFound(location.clone()))?;

        match open_record(key, location, record) {
            Ok(plaintext) => Ok((record.kind, plaintext)),
            Err(Error::DecryptionFailed) => {
                drop(records);
                self.flag_compromised();
                Err(Error::DecryptionFailed)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the record at `location`.
    ///
    /// # Errors
    /// - `PathNotFound` if no record exists at `location`
    pub fn delete(&self, location: &Location) -> Result<()> {
        self.ensure_intact()?;
        let mut records = self.records.write();
        records
            .remove(location)
            .ok_or_else(|| Error::PathNotFound(location.clone()))?;
        drop(records);

        debug!(%location, "record deleted");
        Ok(())
    }

    /// Whether a record exists at `location`.
    pub fn exists(&self, location: &Location) -> bool {
        self.records.read().contains_key(location)
    }

    /// Locations and kinds of stored records, optionally restricted to one
    /// vault path. Never exposes payloads.
    pub fn list(&self, vault_path: Option<&str>) -> Vec<(Location, SecretKind)> {
        let records = self.records.read();
        let mut entries: Vec<_> = records
            .iter()
            .filter(|(location, _)| {
                vault_path.map_or(true, |vault| location.vault_path() == vault)
            })
            .map(|(location, record)| (location.clone(), record.kind))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// The full encrypted record set, sorted by location. Safe to hand to
    /// the snapshot collaborator as-is.
    pub fn export(&self) -> Vec<(Location, Record)> {
        let records = self.records.read();
        let mut entries: Vec<_> = records
            .iter()
            .map(|(location, record)| (location.clone(), record.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Install a record set loaded from a snapshot.
    pub(crate) fn restore(&self, entries: Vec<(Location, Record)>) {
        let mut records = self.records.write();
        records.clear();
        records.extend(entries);
    }

    /// Drop all records. Used at session teardown.
    pub(crate) fn clear(&self) {
        self.records.write().clear();
    }

    /// Acquire exclusive locks on `paths`, waiting at most the configured
    /// timeout for contending procedures to release theirs.
    ///
    /// Paths are taken all-or-nothing while holding the lock table, so two
    /// procedures can never deadlock on overlapping sets.
    ///
    /// # Errors
    /// - `VaultBusy` if the wait bound elapses
    pub(crate) fn lock_paths(&self, paths: &BTreeSet<Location>) -> Result<PathLockGuard<'_>> {
        let deadline = Instant::now() + self.lock_timeout;
        let mut held = self.held.lock();
        while let Some(contended) = paths.iter().find(|p| held.contains(*p)) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::VaultBusy(format!(
                    "lock wait timed out on {}",
                    contended
                )));
            }
            let _ = self.released.wait_for(&mut held, remaining);
        }
        held.extend(paths.iter().cloned());
        Ok(PathLockGuard {
            store: self,
            paths: paths.clone(),
        })
    }

    /// Seal and apply a batch of staged writes atomically.
    ///
    /// All payloads are sealed before the record set is touched, and every
    /// target path is re-validated under the write lock, so a failure at
    /// any point leaves the store unchanged.
    ///
    /// # Errors
    /// - `PathAlreadyExists` if any target path is taken
    pub(crate) fn commit(
        &self,
        writes: &[StagedWrite],
        key: &VaultKey,
        rng: &dyn SecureRng,
    ) -> Result<()> {
        self.ensure_intact()?;

        let mut sealed = Vec::with_capacity(writes.len());
        for write in writes {
            let record = seal_record(
                key,
                rng,
                &write.location,
                write.kind,
                write.plaintext.as_bytes(),
            )?;
            sealed.push((write.location.clone(), record));
        }

        let mut records = self.records.write();
        for (location, _) in &sealed {
            if records.contains_key(location) {
                return Err(Error::PathAlreadyExists(location.clone()));
            }
        }
        for (location, record) in sealed {
            records.insert(location, record);
        }
        Ok(())
    }

    /// Flip a ciphertext byte of the record at `location`.
    #[cfg(test)]
    pub(crate) fn corrupt(&self, location: &Location) {
        let mut records = self.records.write();
        let record = records.get_mut(location).expect("record to corrupt");
        record.ciphertext[0] ^= 0xFF;
    }
}

impl Default for VaultStore {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard over a set of locked paths.
pub(crate) struct PathLockGuard<'a> {
    store: &'a VaultStore,
    paths: BTreeSet<Location>,
}

impl std::fmt::Debug for PathLockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLockGuard")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl Drop for PathLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.store.held.lock();
        for path in &self.paths {
            held.remove(path);
        }
        self.store.released.notify_all();
    }
}

fn seal_record(
    key: &VaultKey,
    rng: &dyn SecureRng,
    location: &Location,
    kind: SecretKind,
    plaintext: &[u8],
) -> Result<Record> {
    let record_key = key.derive_record_key(
        location.vault_path().as_bytes(),
        location.record_path().as_bytes(),
    );
    let nonce = aead::generate_nonce(rng)?;
    let ciphertext = aead::seal(&record_key, &nonce, location.to_string().as_bytes(), plaintext)?;
    Ok(Record {
        kind,
        nonce: nonce.to_vec(),
        ciphertext,
        created_at: Utc::now(),
    })
}

fn open_record(key: &VaultKey, location: &Location, record: &Record) -> Result<Zeroizing<Vec<u8>>> {
    let record_key = key.derive_record_key(
        location.vault_path().as_bytes(),
        location.record_path().as_bytes(),
    );
    aead::open(
        &record_key,
        &record.nonce,
        location.to_string().as_bytes(),
        &record.ciphertext,
    )
}
