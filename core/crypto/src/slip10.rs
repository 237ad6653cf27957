//! SLIP10 hierarchical key derivation over curve Ed25519.
//!
//! A master node is computed from a seed with HMAC-SHA512 keyed by the
//! string `"ed25519 seed"`, then child nodes are derived one chain segment
//! at a time. Ed25519 admits hardened derivation only, so every segment
//! must carry the hardened flag; a non-hardened segment is rejected before
//! any key material is touched.
//!
//! Derivation is fully deterministic: the same (seed, chain) pair always
//! yields the same key and chain code.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

use boltvault_common::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

/// Key for the master-node HMAC, fixed by SLIP-0010 for curve Ed25519.
const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// Offset marking an index as hardened.
pub const HARDEN_OFFSET: u32 = 0x8000_0000;

/// Length of a derived secret key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of a chain code in bytes.
pub const CHAIN_CODE_LENGTH: usize = 32;

/// One segment of a chain path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment(u32);

impl Segment {
    /// Hardened segment for `index` (the hardened flag is added here).
    pub fn hardened(index: u32) -> Self {
        Self(index | HARDEN_OFFSET)
    }

    /// Non-hardened segment for `index`. Accepted by the type so malformed
    /// chains can be represented and rejected at derivation time.
    pub fn non_hardened(index: u32) -> Self {
        Self(index & !HARDEN_OFFSET)
    }

    /// Whether the hardened flag is set.
    pub fn is_hardened(&self) -> bool {
        self.0 & HARDEN_OFFSET != 0
    }

    /// The index without the hardened flag.
    pub fn index(&self) -> u32 {
        self.0 & !HARDEN_OFFSET
    }

    /// The raw serialization value, hardened flag included.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())?;
        if self.is_hardened() {
            write!(f, "'")?;
        }
        Ok(())
    }
}

/// A chain path: an ordered list of derivation segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain(Vec<Segment>);

impl Chain {
    /// The empty chain (derives the master node itself).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a chain of hardened segments from plain indices.
    pub fn from_hardened(indices: impl IntoIterator<Item = u32>) -> Self {
        Self(indices.into_iter().map(Segment::hardened).collect())
    }

    /// Build a chain from explicit segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Parse a path of the form `m/44'/4218'/0'`.
    ///
    /// The leading `m` is optional; `'` and `h` both mark a hardened
    /// segment.
    ///
    /// # Errors
    /// - Returns `InvalidParameters` for an index that is not a number or
    ///   does not fit below the hardened offset
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let trimmed = path.trim_start_matches("m/").trim_start_matches('m');
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }
        for part in trimmed.split('/') {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            let index: u32 = digits.parse().map_err(|_| {
                Error::InvalidParameters(format!("malformed chain segment: {}", part))
            })?;
            if index >= HARDEN_OFFSET {
                return Err(Error::InvalidParameters(format!(
                    "chain index out of range: {}",
                    index
                )));
            }
            segments.push(if hardened {
                Segment::hardened(index)
            } else {
                Segment::non_hardened(index)
            });
        }
        Ok(Self(segments))
    }

    /// The segments in derivation order.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Whether the chain has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// A derived node: secret key plus chain code.
pub struct DerivedKey {
    secret: Zeroizing<[u8; KEY_LENGTH]>,
    chain_code: [u8; CHAIN_CODE_LENGTH],
}

impl DerivedKey {
    /// The secret key half.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn secret_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.secret
    }

    /// The chain code half. Chain codes are returned to callers as the
    /// public output of a derivation.
    pub fn chain_code(&self) -> [u8; CHAIN_CODE_LENGTH] {
        self.chain_code
    }

    /// Record layout: secret key followed by chain code.
    pub fn to_record_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(KEY_LENGTH + CHAIN_CODE_LENGTH));
        bytes.extend_from_slice(&self.secret[..]);
        bytes.extend_from_slice(&self.chain_code);
        bytes
    }

    /// Parse the record layout back into a node.
    ///
    /// # Errors
    /// - Returns `InvalidParameters` if `bytes` is not key || chain code
    pub fn from_record_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LENGTH + CHAIN_CODE_LENGTH {
            return Err(Error::InvalidParameters(format!(
                "slip10 record needs {} bytes, got {}",
                KEY_LENGTH + CHAIN_CODE_LENGTH,
                bytes.len()
            )));
        }
        let mut secret = Zeroizing::new([0u8; KEY_LENGTH]);
        secret.copy_from_slice(&bytes[..KEY_LENGTH]);
        let mut chain_code = [0u8; CHAIN_CODE_LENGTH];
        chain_code.copy_from_slice(&bytes[KEY_LENGTH..]);
        Ok(Self { secret, chain_code })
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

fn split_digest(digest: &[u8]) -> DerivedKey {
    let mut secret = Zeroizing::new([0u8; KEY_LENGTH]);
    secret.copy_from_slice(&digest[..KEY_LENGTH]);
    let mut chain_code = [0u8; CHAIN_CODE_LENGTH];
    chain_code.copy_from_slice(&digest[KEY_LENGTH..]);
    DerivedKey { secret, chain_code }
}

/// Compute the master node for a seed.
///
/// # Errors
/// - Returns `InvalidParameters` for an empty seed
pub fn master(seed: &[u8]) -> Result<DerivedKey> {
    if seed.is_empty() {
        return Err(Error::InvalidParameters("slip10 seed cannot be empty".to_string()));
    }
    let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY)
        .map_err(|e| Error::Crypto(format!("hmac init failed: {}", e)))?;
    mac.update(seed);
    let mut digest = Zeroizing::new([0u8; 64]);
    digest.copy_from_slice(&mac.finalize().into_bytes());
    Ok(split_digest(&digest[..]))
}

fn child(parent: &DerivedKey, segment: Segment) -> Result<DerivedKey> {
    if !segment.is_hardened() {
        return Err(Error::InvalidParameters(format!(
            "ed25519 slip10 derivation requires hardened segments, got {}",
            segment
        )));
    }
    let mut mac = HmacSha512::new_from_slice(&parent.chain_code)
        .map_err(|e| Error::Crypto(format!("hmac init failed: {}", e)))?;
    mac.update(&[0x00]);
    mac.update(&parent.secret[..]);
    mac.update(&segment.raw().to_be_bytes());
    let mut digest = Zeroizing::new([0u8; 64]);
    digest.copy_from_slice(&mac.finalize().into_bytes());
    Ok(split_digest(&digest[..]))
}

/// Derive a node from a parent along a chain.
pub fn derive_key(parent: &DerivedKey, chain: &Chain) -> Result<DerivedKey> {
    let mut node = DerivedKey {
        secret: parent.secret.clone(),
        chain_code: parent.chain_code,
    };
    for segment in chain.segments() {
        node = child(&node, *segment)?;
    }
    Ok(node)
}

/// Derive a node from a seed along a chain.
pub fn derive_seed(seed: &[u8], chain: &Chain) -> Result<DerivedKey> {
    let node = master(seed)?;
    derive_key(&node, chain)
}
