//! Error types for zots-core.
//!
//! Codec and digest failures are surfaced as [`Error`]. Collaborator failures
//! have their own type ([`crate::ledger::LedgerError`]) so the workflows can
//! pass them through instead of re-wrapping them.

use thiserror::Error;

/// Core errors for proof construction, hashing and (de)serialization.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied digest or hex identifier is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Proof declares a version this implementation does not understand.
    #[error("Unsupported proof version {found} (highest supported: {supported})")]
    UnsupportedVersion { found: u64, supported: u8 },

    /// Canonical or compact text is structurally broken.
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// The original content does not hash to the proof's digest.
    #[error("Content mismatch: proof digest {expected}, content digest {actual}")]
    ContentMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedProof(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
