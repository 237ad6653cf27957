//! Secure random source seam.
//!
//! All randomness consumed by the vault flows through the [`SecureRng`]
//! trait so that key generation, nonces and seeds come from one auditable
//! source. A failing source is fatal: the operation aborts with
//! `RngFailure` and is never silently served from a weaker generator.

use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;

use boltvault_common::{Error, Result};

/// Supplier of cryptographically secure random bytes.
pub trait SecureRng: Send + Sync {
    /// Fill `dest` with random bytes.
    ///
    /// # Errors
    /// - Returns `RngFailure` if the underlying source cannot produce
    ///   the requested bytes
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSecureRng;

impl SecureRng for OsSecureRng {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| Error::RngFailure(e.to_string()))
    }
}

enum FixedSource {
    /// Consumes a finite byte stream, then fails.
    Stream { bytes: Vec<u8>, position: usize },
    /// Repeats a single byte forever.
    Constant(u8),
}

/// Deterministic random source for tests and reference vectors.
///
/// `FixedRng::new` replays the given bytes in order and fails with
/// `RngFailure` once the stream is exhausted, which makes draw order and
/// draw size part of the assertion. `FixedRng::constant` never runs out.
pub struct FixedRng {
    source: Mutex<FixedSource>,
}

impl FixedRng {
    /// Replay `bytes` sequentially; further draws fail.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            source: Mutex::new(FixedSource::Stream { bytes, position: 0 }),
        }
    }

    /// Produce `byte` forever.
    pub fn constant(byte: u8) -> Self {
        Self {
            source: Mutex::new(FixedSource::Constant(byte)),
        }
    }
}

impl SecureRng for FixedRng {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        let mut source = self.source.lock();
        match &mut *source {
            FixedSource::Stream { bytes, position } => {
                let remaining = bytes.len() - *position;
                if dest.len() > remaining {
                    return Err(Error::RngFailure(format!(
                        "fixed byte stream exhausted: {} requested, {} remaining",
                        dest.len(),
                        remaining
                    )));
                }
                dest.copy_from_slice(&bytes[*position..*position + dest.len()]);
                *position += dest.len();
                Ok(())
            }
            FixedSource::Constant(byte) => {
                dest.fill(*byte);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_rng_produces_distinct_buffers() {
        let rng = OsSecureRng;
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        rng.fill(&mut a).unwrap();
        rng.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fixed_rng_replays_stream() {
        let rng = FixedRng::new(vec![1, 2, 3, 4]);
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        rng.fill(&mut first).unwrap();
        rng.fill(&mut second).unwrap();
        assert_eq!(first, [1, 2]);
        assert_eq!(second, [3, 4]);
    }

    #[test]
    fn test_fixed_rng_exhaustion_fails() {
        let rng = FixedRng::new(vec![1, 2]);
        let mut buf = [0u8; 3];
        let err = rng.fill(&mut buf).unwrap_err();
        assert!(matches!(err, Error::RngFailure(_)));
    }

    #[test]
    fn test_constant_rng_never_exhausts() {
        let rng = FixedRng::constant(0xAB);
        let mut buf = [0u8; 64];
        rng.fill(&mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAB));
    }
}
