//! Timestamp proof model.
//!
//! A proof is a digest plus zero or more blockchain attestations. It knows
//! nothing about how it is serialized; see [`crate::canonical`] and
//! [`crate::compact`].

use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use crate::ledger::Confirmation;
use crate::memo::MEMO_PAYLOAD_OFFSET;
use crate::types::{Digest, Network, TxId};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// Current (and highest supported) proof format version
pub const PROOF_VERSION: u8 = 1;

/// Attestation type tag for a digest embedded in a chain transaction memo
pub const ATTESTATION_TYPE_CHAIN_MEMO: u8 = 0x01;

/// Reject any version other than the one this build implements.
pub(crate) fn check_version(found: u64) -> Result<()> {
    if found == u64::from(PROOF_VERSION) {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion {
            found,
            supported: PROOF_VERSION,
        })
    }
}

/// One blockchain anchor for a proof's digest.
///
/// Only built from an observed confirmation; never edited once attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attestation {
    /// Network the anchoring transaction lives on
    pub network: Network,
    /// Anchoring transaction (internal byte order)
    pub txid: TxId,
    /// Height of the confirming block
    pub block_height: u32,
    /// Block timestamp (Unix seconds); the authoritative time of the proof
    pub block_time: u32,
    /// Offset of the digest payload inside the transaction memo
    pub memo_offset: u16,
}

impl Attestation {
    pub fn new(
        network: Network,
        txid: TxId,
        block_height: u32,
        block_time: u32,
        memo_offset: u16,
    ) -> Self {
        Self {
            network,
            txid,
            block_height,
            block_time,
            memo_offset,
        }
    }

    /// Build an attestation from a confirmation reported by the ledger.
    ///
    /// Ledgers publish [`crate::memo::create_timestamp_memo`] verbatim, so the
    /// payload sits at [`MEMO_PAYLOAD_OFFSET`].
    pub fn from_confirmation(txid: TxId, confirmation: &Confirmation) -> Self {
        Self::new(
            confirmation.network,
            txid,
            confirmation.block_height,
            confirmation.block_time,
            MEMO_PAYLOAD_OFFSET,
        )
    }

    /// Transaction id in display (byte-reversed) order
    pub fn txid_hex(&self) -> String {
        self.txid.to_display_hex()
    }

    /// Explorer link for the anchoring transaction
    pub fn explorer_link(&self) -> String {
        format!("{}/tx/{}", self.network.explorer_url(), self.txid_hex())
    }

    /// Block timestamp as a UTC datetime
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.block_time), 0).unwrap_or_default()
    }
}

/// A timestamp proof: digest, the algorithm that produced it, and its anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampProof {
    /// Proof format version
    pub version: u8,
    /// Algorithm that produced `digest`
    pub algorithm: DigestAlgorithm,
    /// Content fingerprint
    pub digest: Digest,
    /// Anchors in insertion order; the first is the primary one
    pub attestations: Vec<Attestation>,
}

impl TimestampProof {
    /// Create a pending proof (no attestations yet).
    pub fn new(digest: Digest, algorithm: DigestAlgorithm) -> Self {
        Self {
            version: PROOF_VERSION,
            algorithm,
            digest,
            attestations: Vec::new(),
        }
    }

    /// Append an attestation.
    pub fn add_attestation(&mut self, attestation: Attestation) {
        self.attestations.push(attestation);
    }

    /// Whether at least one attestation is present
    pub fn is_confirmed(&self) -> bool {
        !self.attestations.is_empty()
    }

    pub fn primary_attestation(&self) -> Option<&Attestation> {
        self.attestations.first()
    }

    /// Human-readable multi-line description.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Version: {}", self.version);
        let _ = writeln!(out, "Hash Algorithm: {}", self.algorithm.name());
        let _ = writeln!(out, "Hash: {}", self.digest);
        let _ = writeln!(
            out,
            "Status: {}",
            if self.is_confirmed() { "Confirmed" } else { "Pending" }
        );
        let _ = writeln!(out, "Attestations: {}", self.attestations.len());

        for (i, att) in self.attestations.iter().enumerate() {
            let _ = writeln!(out, "\nAttestation #{}:", i + 1);
            let _ = writeln!(out, "  Network: {}", att.network);
            let _ = writeln!(out, "  Block Height: {}", att.block_height);
            let _ = writeln!(out, "  Block Time: {}", att.timestamp().to_rfc3339());
            let _ = writeln!(out, "  TX ID: {}", att.txid_hex());
            let _ = writeln!(out, "  Explorer: {}", att.explorer_link());
        }

        out
    }
}

/// Create a pending proof for a digest.
pub fn create_proof(digest: Digest, algorithm: DigestAlgorithm) -> TimestampProof {
    TimestampProof::new(digest, algorithm)
}
