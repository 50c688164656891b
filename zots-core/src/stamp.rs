//! Stamping workflow.
//!
//! ```text
//! Hashed -> Submitted -> Pending            (caller opted out of waiting)
//!                     -> Confirmed -> Proved
//! any non-terminal    -> Failed
//! ```
//!
//! The workflow does no chain I/O itself; every chain interaction goes through
//! the injected [`Ledger`]. It persists nothing: when a stamp ends in
//! `Pending` or fails after `Submitted`, the transaction id is handed back to
//! the caller so the proof can be completed later.

use crate::digest::{digest, digest_file, digest_from_hex, digest_stream, DigestAlgorithm};
use crate::error::Result;
use crate::ledger::{cancellable, with_timeout, Confirmation, Ledger, LedgerError, WaitPolicy};
use crate::proof::{Attestation, TimestampProof};
use crate::types::{Digest, TxId};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Stamping configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StampConfig {
    /// Wait for confirmation (`false` emits a pending proof right after broadcast)
    pub wait: bool,
    /// Confirmation polling budget
    pub policy: WaitPolicy,
    /// Timeout for the broadcast call
    pub call_timeout: Option<Duration>,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            wait: true,
            policy: WaitPolicy::default(),
            call_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl StampConfig {
    /// Do not wait for confirmation.
    pub fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Stage at which a stamp failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampStage {
    /// Broadcasting the digest transaction
    Submit,
    /// Waiting for the transaction to be mined
    Confirm,
}

impl fmt::Display for StampStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StampStage::Submit => write!(f, "submit"),
            StampStage::Confirm => write!(f, "confirm"),
        }
    }
}

/// Workflow state. `Pending`, `Proved` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum StampState {
    Hashed {
        proof: TimestampProof,
    },
    Submitted {
        proof: TimestampProof,
        txid: TxId,
    },
    Pending {
        proof: TimestampProof,
        txid: TxId,
    },
    Confirmed {
        proof: TimestampProof,
        txid: TxId,
        confirmation: Confirmation,
    },
    Proved {
        proof: TimestampProof,
        txid: TxId,
    },
    Failed {
        stage: StampStage,
        txid: Option<TxId>,
        error: LedgerError,
    },
}

impl StampState {
    /// Start from an already computed digest.
    pub fn hashed(digest: Digest, algorithm: DigestAlgorithm) -> Self {
        StampState::Hashed {
            proof: TimestampProof::new(digest, algorithm),
        }
    }

    pub fn from_bytes(data: &[u8], algorithm: DigestAlgorithm) -> Self {
        Self::hashed(digest(data, algorithm), algorithm)
    }

    pub fn from_reader<R: Read>(reader: R, algorithm: DigestAlgorithm) -> Result<Self> {
        Ok(Self::hashed(digest_stream(reader, algorithm)?, algorithm))
    }

    pub fn from_file(path: impl AsRef<Path>, algorithm: DigestAlgorithm) -> Result<Self> {
        Ok(Self::hashed(digest_file(path, algorithm)?, algorithm))
    }

    /// From a 64-char digest or a 40-char identifier (see [`digest_from_hex`]).
    pub fn from_hex(text: &str, algorithm: DigestAlgorithm) -> Result<Self> {
        Ok(Self::hashed(digest_from_hex(text, algorithm)?, algorithm))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StampState::Pending { .. } | StampState::Proved { .. } | StampState::Failed { .. }
        )
    }

    /// Transaction id, once one has been obtained.
    pub fn txid(&self) -> Option<TxId> {
        match self {
            StampState::Hashed { .. } => None,
            StampState::Submitted { txid, .. }
            | StampState::Pending { txid, .. }
            | StampState::Confirmed { txid, .. }
            | StampState::Proved { txid, .. } => Some(*txid),
            StampState::Failed { txid, .. } => *txid,
        }
    }

    pub fn proof(&self) -> Option<&TimestampProof> {
        match self {
            StampState::Hashed { proof }
            | StampState::Submitted { proof, .. }
            | StampState::Pending { proof, .. }
            | StampState::Confirmed { proof, .. }
            | StampState::Proved { proof, .. } => Some(proof),
            StampState::Failed { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StampState::Hashed { .. } => "hashed",
            StampState::Submitted { .. } => "submitted",
            StampState::Pending { .. } => "pending",
            StampState::Confirmed { .. } => "confirmed",
            StampState::Proved { .. } => "proved",
            StampState::Failed { .. } => "failed",
        }
    }
}

/// Successful end of a stamp.
#[derive(Debug, Clone, PartialEq)]
pub enum Stamped {
    /// Broadcast but not waited for; the proof has no attestations.
    Pending { proof: TimestampProof, txid: TxId },
    /// Confirmed and attested.
    Proved { proof: TimestampProof, txid: TxId },
}

impl Stamped {
    pub fn proof(&self) -> &TimestampProof {
        match self {
            Stamped::Pending { proof, .. } | Stamped::Proved { proof, .. } => proof,
        }
    }

    pub fn txid(&self) -> TxId {
        match self {
            Stamped::Pending { txid, .. } | Stamped::Proved { txid, .. } => *txid,
        }
    }

    pub fn into_proof(self) -> TimestampProof {
        match self {
            Stamped::Pending { proof, .. } | Stamped::Proved { proof, .. } => proof,
        }
    }
}

/// A failed stamp. Carries the transaction id if one had been obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stamping failed at {stage} stage: {source}")]
pub struct StampError {
    pub stage: StampStage,
    pub txid: Option<TxId>,
    #[source]
    pub source: LedgerError,
}

/// Drives [`StampState`] transitions against a ledger.
#[derive(Clone)]
pub struct StampWorkflow {
    ledger: Arc<dyn Ledger>,
    config: StampConfig,
}

impl StampWorkflow {
    pub fn new(ledger: Arc<dyn Ledger>, config: StampConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub async fn advance(&self, state: StampState, cancel: &CancellationToken) -> StampState {
        match state {
            StampState::Hashed { proof } => {
                tracing::debug!(
                    ledger = self.ledger.name(),
                    digest = %proof.digest,
                    "Publishing digest"
                );
                let publish = with_timeout(
                    self.config.call_timeout,
                    self.ledger.publish_digest(&proof.digest),
                );
                match cancellable(cancel, publish).await {
                    Ok(txid) => {
                        tracing::info!(%txid, "Digest transaction broadcast");
                        StampState::Submitted { proof, txid }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "Broadcast failed");
                        StampState::Failed {
                            stage: StampStage::Submit,
                            txid: None,
                            error,
                        }
                    }
                }
            }

            StampState::Submitted { proof, txid } => {
                if !self.config.wait {
                    tracing::info!(%txid, "Not waiting for confirmation, proof is pending");
                    return StampState::Pending { proof, txid };
                }

                match self
                    .ledger
                    .await_confirmation(&txid, &self.config.policy, cancel)
                    .await
                {
                    Ok(confirmation) => {
                        tracing::info!(
                            %txid,
                            block_height = confirmation.block_height,
                            "Transaction confirmed"
                        );
                        StampState::Confirmed {
                            proof,
                            txid,
                            confirmation,
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%txid, %error, "Confirmation failed");
                        StampState::Failed {
                            stage: StampStage::Confirm,
                            txid: Some(txid),
                            error,
                        }
                    }
                }
            }

            StampState::Confirmed {
                mut proof,
                txid,
                confirmation,
            } => {
                proof.add_attestation(Attestation::from_confirmation(txid, &confirmation));
                tracing::debug!(
                    %txid,
                    attestations = proof.attestations.len(),
                    "Attestation appended"
                );
                StampState::Proved { proof, txid }
            }

            terminal => terminal,
        }
    }

    /// Advance until a terminal state.
    pub async fn run(
        &self,
        mut state: StampState,
        cancel: &CancellationToken,
    ) -> std::result::Result<Stamped, StampError> {
        loop {
            state = match state {
                StampState::Pending { proof, txid } => return Ok(Stamped::Pending { proof, txid }),
                StampState::Proved { proof, txid } => return Ok(Stamped::Proved { proof, txid }),
                StampState::Failed { stage, txid, error } => {
                    return Err(StampError {
                        stage,
                        txid,
                        source: error,
                    })
                }
                other => self.advance(other, cancel).await,
            };
        }
    }

    /// Stamp an already computed digest.
    pub async fn stamp(
        &self,
        digest: Digest,
        algorithm: DigestAlgorithm,
        cancel: &CancellationToken,
    ) -> std::result::Result<Stamped, StampError> {
        self.run(StampState::hashed(digest, algorithm), cancel).await
    }
}

impl fmt::Debug for StampWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampWorkflow")
            .field("ledger", &self.ledger.name())
            .field("config", &self.config)
            .finish()
    }
}
