//! Canonical (long form) proof encoding.
//!
//! Field-named, pretty-printed JSON meant to be read and diffed by humans:
//!
//! ```json
//! {
//!   "version": 1,
//!   "hash_algorithm": "sha256",
//!   "hash": "<64 hex>",
//!   "attestations": [
//!     {
//!       "network": "testnet",
//!       "txid": "<display-order hex>",
//!       "block_height": 3721456,
//!       "block_time": 1734567890,
//!       "memo_offset": 0
//!     }
//!   ]
//! }
//! ```
//!
//! Unknown fields are ignored on decode. The version is checked on the raw
//! document before any other field is interpreted.

use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use crate::proof::{check_version, Attestation, TimestampProof};
use crate::types::{Digest, Network, TxId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
struct CanonicalProof {
    version: u8,
    hash_algorithm: DigestAlgorithm,
    hash: Digest,
    attestations: Vec<CanonicalAttestation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CanonicalAttestation {
    network: Network,
    txid: TxId,
    block_height: u32,
    block_time: u32,
    memo_offset: u16,
}

impl From<&Attestation> for CanonicalAttestation {
    fn from(att: &Attestation) -> Self {
        Self {
            network: att.network,
            txid: att.txid,
            block_height: att.block_height,
            block_time: att.block_time,
            memo_offset: att.memo_offset,
        }
    }
}

impl From<CanonicalAttestation> for Attestation {
    fn from(att: CanonicalAttestation) -> Self {
        Attestation::new(
            att.network,
            att.txid,
            att.block_height,
            att.block_time,
            att.memo_offset,
        )
    }
}

/// Encode a proof to its canonical text form.
pub fn encode_canonical(proof: &TimestampProof) -> Result<String> {
    check_version(u64::from(proof.version))?;

    let wire = CanonicalProof {
        version: proof.version,
        hash_algorithm: proof.algorithm,
        hash: proof.digest,
        attestations: proof.attestations.iter().map(CanonicalAttestation::from).collect(),
    };

    serde_json::to_string_pretty(&wire)
        .map_err(|e| Error::malformed(format!("canonical encoding failed: {e}")))
}

/// Decode a proof from its canonical text form.
pub fn decode_canonical(text: &str) -> Result<TimestampProof> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::malformed(format!("not a JSON document: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::malformed("proof must be a JSON object"))?;

    let version = object
        .get("version")
        .ok_or_else(|| Error::malformed("missing field `version`"))?
        .as_u64()
        .ok_or_else(|| Error::malformed("`version` must be a non-negative integer"))?;
    check_version(version)?;

    let wire: CanonicalProof =
        serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))?;

    if wire.hash_algorithm.digest_len() != Digest::LEN {
        return Err(Error::malformed("digest length does not match algorithm"));
    }

    Ok(TimestampProof {
        version: wire.version,
        algorithm: wire.hash_algorithm,
        digest: wire.hash,
        attestations: wire.attestations.into_iter().map(Attestation::from).collect(),
    })
}
