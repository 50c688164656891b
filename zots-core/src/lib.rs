//! # zots-core
//!
//! Proof model, serialization formats and workflows for anchoring data
//! digests in blockchain transactions.
//!
//! ## Key Features
//! - **Digest engine**: SHA-256 (default) or BLAKE3 over bytes, readers and files
//! - **Canonical form**: human-readable JSON, forward-compatible on read
//! - **Compact form**: `zots1` + base64url(CBOR(binary record)) for QR codes,
//!   image metadata and commit trailers
//! - **Stamping**: hash -> publish -> bounded confirmation wait -> attest
//! - **Verification**: per-attestation memo checks through a pluggable ledger
//!
//! ## Example
//!
//! ```rust
//! use zots_core::{create_proof, decode_compact, digest, encode_compact, DigestAlgorithm};
//!
//! let d = digest(b"hello world", DigestAlgorithm::Sha256);
//! let proof = create_proof(d, DigestAlgorithm::Sha256);
//!
//! let compact = encode_compact(&proof).unwrap();
//! assert!(compact.starts_with("zots1"));
//! assert_eq!(decode_compact(&compact).unwrap(), proof);
//! ```

pub mod canonical;
pub mod compact;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod memo;
pub mod proof;
pub mod sniff;
pub mod stamp;
pub mod types;
pub mod verify;

pub use canonical::{decode_canonical, encode_canonical};
pub use compact::{decode_compact, encode_compact, is_compact, COMPACT_PREFIX};
pub use digest::{digest, digest_file, digest_from_hex, digest_stream, DigestAlgorithm};
pub use error::{Error, Result};
pub use ledger::{Confirmation, Ledger, LedgerError, WaitPolicy};
pub use memo::{create_timestamp_memo, parse_timestamp_memo};
pub use proof::{create_proof, Attestation, TimestampProof, PROOF_VERSION};
pub use sniff::{classify, decode_any, ProofFormat};
pub use stamp::{StampConfig, StampError, StampStage, StampState, StampWorkflow, Stamped};
pub use types::{Digest, Hash256, Network, TxId};
pub use verify::{
    check_content, AttestationCheck, Verdict, VerificationReport, Verifier, VerifyConfig,
    VerifyError,
};

/// Re-export for callers driving cancellation
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    }

    #[test]
    fn test_both_forms_share_one_model() {
        let proof = create_proof(digest(b"x", DigestAlgorithm::Blake3), DigestAlgorithm::Blake3);
        let from_canonical = decode_canonical(&encode_canonical(&proof).unwrap()).unwrap();
        let from_compact = decode_compact(&encode_compact(&proof).unwrap()).unwrap();
        assert_eq!(from_canonical, from_compact);
    }
}
