//! In-memory snapshot implementation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SnapshotSource;
use boltvault_common::{Error, Location, Record, Result};

/// Snapshot payload version for migration support.
const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    version: u32,
    records: Vec<Entry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    location: Location,
    record: Record,
}

/// Snapshot source backed by an in-memory blob.
///
/// Useful for tests and for callers that move the blob to its final
/// destination themselves.
#[derive(Default)]
pub struct MemorySnapshot {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshot {
    /// Create an empty snapshot (loads as a fresh vault).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a snapshot over an existing blob.
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }

    /// The most recently produced blob, if any.
    pub fn blob(&self) -> Option<Vec<u8>> {
        self.blob.lock().clone()
    }
}

impl SnapshotSource for MemorySnapshot {
    fn load(&self) -> Result<Vec<(Location, Record)>> {
        let blob = self.blob.lock();
        let Some(bytes) = blob.as_deref() else {
            return Ok(Vec::new());
        };

        let payload: Payload = serde_json::from_slice(bytes)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        if payload.version != PAYLOAD_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version: {}",
                payload.version
            )));
        }

        debug!(records = payload.records.len(), "snapshot loaded");
        Ok(payload
            .records
            .into_iter()
            .map(|entry| (entry.location, entry.record))
            .collect())
    }

    fn produce(&self, records: &[(Location, Record)]) -> Result<Vec<u8>> {
        let payload = Payload {
            version: PAYLOAD_VERSION,
            records: records
                .iter()
                .map(|(location, record)| Entry {
                    location: location.clone(),
                    record: record.clone(),
                })
                .collect(),
        };

        let bytes =
            serde_json::to_vec(&payload).map_err(|e| Error::Serialization(e.to_string()))?;
        *self.blob.lock() = Some(bytes.clone());

        debug!(records = records.len(), size = bytes.len(), "snapshot produced");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltvault_common::SecretKind;
    use chrono::Utc;

    fn sample_record() -> Record {
        Record {
            kind: SecretKind::Ed25519Key,
            nonce: vec![7; 24],
            ciphertext: vec![9; 48],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_snapshot_loads_fresh() {
        let snapshot = MemorySnapshot::new();
        assert!(snapshot.load().unwrap().is_empty());
        assert!(snapshot.blob().is_none());
    }

    #[test]
    fn test_produce_load_roundtrip() {
        let snapshot = MemorySnapshot::new();
        let records = vec![
            (Location::new("v", "a").unwrap(), sample_record()),
            (Location::new("v", "b").unwrap(), sample_record()),
        ];

        let blob = snapshot.produce(&records).unwrap();
        assert_eq!(snapshot.blob().as_deref(), Some(&blob[..]));

        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_blob_transfers_between_sources() {
        let source = MemorySnapshot::new();
        let records = vec![(Location::new("v", "a").unwrap(), sample_record())];
        let blob = source.produce(&records).unwrap();

        let restored = MemorySnapshot::with_blob(blob);
        assert_eq!(restored.load().unwrap(), records);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let payload = serde_json::json!({ "version": 99, "records": [] });
        let snapshot = MemorySnapshot::with_blob(serde_json::to_vec(&payload).unwrap());
        assert!(matches!(snapshot.load(), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_corrupt_blob_rejected() {
        let snapshot = MemorySnapshot::with_blob(b"not json".to_vec());
        assert!(matches!(snapshot.load(), Err(Error::Serialization(_))));
    }
}
