//! Common types shared across Boltvault crates.
//!
//! This crate provides the error taxonomy and the vault data model
//! (locations, encrypted records, secret buffers) used by every other
//! crate in the workspace.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{Location, Record, SecretBytes, SecretKind};
