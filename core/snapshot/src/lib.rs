//! Snapshot collaborator interface.
//!
//! Persistent vaults load their initial record set through a
//! [`SnapshotSource`] and hand the current record set back to it before
//! closing. Records cross this boundary encrypted only; a snapshot
//! implementation never sees plaintext or key material.
//!
//! The on-disk packaging of a snapshot is a collaborator concern and is
//! deliberately not fixed here; [`MemorySnapshot`] is the reference
//! implementation used by tests and ephemeral tooling.

pub mod memory;

use boltvault_common::{Location, Record, Result};

pub use memory::MemorySnapshot;

/// Loader and sink for a vault's encrypted record set.
pub trait SnapshotSource: Send + Sync {
    /// Load the record set persisted by an earlier [`produce`](Self::produce).
    ///
    /// An empty result means a fresh vault.
    fn load(&self) -> Result<Vec<(Location, Record)>>;

    /// Serialize and persist the given record set.
    ///
    /// # Postconditions
    /// - A subsequent [`load`](Self::load) returns an equal record set
    /// - Returns the serialized blob for callers that manage placement
    ///   themselves
    fn produce(&self, records: &[(Location, Record)]) -> Result<Vec<u8>>;
}
