//! Verification workflow.
//!
//! 1. Optionally re-hash the original content and compare (short-circuits).
//! 2. A proof with no attestations is `Unconfirmed`, a state rather than an error.
//! 3. Each attestation's memo is fetched through the ledger and its embedded
//!    digest compared against the proof; checks run concurrently.
//! 4. Overall verdict over the attestations that could be judged: any
//!    `DigestMismatch` wins, otherwise at least one `Valid` makes the proof
//!    valid. A ledger outage on one attestation is recorded on its check and
//!    only fails the whole verification when nothing could be judged.

use crate::digest::digest;
use crate::error::Error;
use crate::ledger::{with_timeout, Ledger, LedgerError};
use crate::memo::parse_timestamp_memo;
use crate::proof::{check_version, Attestation, TimestampProof};
use crate::types::Digest;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of verifying a proof or one of its attestations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Memo digest matches the proof
    Valid,
    /// Supplied content does not hash to the proof digest
    ContentMismatch,
    /// No attestations yet (pending proof)
    Unconfirmed,
    /// Memo present but carries a different digest (forged or corrupted)
    DigestMismatch,
    /// Ledger could not locate the transaction
    TransactionNotFound,
    /// Transaction found but its memo could not be decrypted
    MemoUnreadable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Valid => "valid",
            Verdict::ContentMismatch => "content mismatch",
            Verdict::Unconfirmed => "unconfirmed",
            Verdict::DigestMismatch => "digest mismatch",
            Verdict::TransactionNotFound => "transaction not found",
            Verdict::MemoUnreadable => "memo unreadable",
        };
        f.write_str(s)
    }
}

/// Result of checking one attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationCheck {
    /// Position in the proof's attestation list
    pub index: usize,
    pub attestation: Attestation,
    /// `None` when the ledger could not be asked (see `error`)
    pub verdict: Option<Verdict>,
    /// Digest found in the memo, if any
    pub memo_digest: Option<Digest>,
    /// Collaborator message or reason for a mismatch
    pub detail: Option<String>,
    /// Outage that kept this attestation from being judged
    pub error: Option<LedgerError>,
}

impl AttestationCheck {
    pub fn is_judged(&self) -> bool {
        self.verdict.is_some()
    }
}

/// Aggregated verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub verdict: Verdict,
    /// Digest claimed by the proof
    pub digest: Digest,
    /// Digest of the supplied original content, when given
    pub content_digest: Option<Digest>,
    /// Per-attestation results in proof order
    pub checks: Vec<AttestationCheck>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    /// Earliest block time among valid attestations.
    pub fn attested_time(&self) -> Option<DateTime<Utc>> {
        self.checks
            .iter()
            .filter(|c| c.verdict == Some(Verdict::Valid))
            .min_by_key(|c| c.attestation.block_time)
            .map(|c| c.attestation.timestamp())
    }
}

/// Failures that say nothing about the proof itself.
///
/// `Ledger` is only returned when no attestation at all could be judged.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Proof(#[from] Error),

    #[error("Ledger error while checking attestation {index}: {source}")]
    Ledger {
        index: usize,
        #[source]
        source: LedgerError,
    },
}

/// Verification configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Timeout for each memo fetch
    pub call_timeout: Option<Duration>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Compare original content against a proof's digest.
pub fn check_content(proof: &TimestampProof, original: &[u8]) -> Result<(), Error> {
    let actual = digest(original, proof.algorithm);
    if actual == proof.digest {
        Ok(())
    } else {
        Err(Error::ContentMismatch {
            expected: proof.digest.to_hex(),
            actual: actual.to_hex(),
        })
    }
}

/// Checks proofs against a ledger.
#[derive(Clone)]
pub struct Verifier {
    ledger: Arc<dyn Ledger>,
    config: VerifyConfig,
}

impl Verifier {
    pub fn new(ledger: Arc<dyn Ledger>, config: VerifyConfig) -> Self {
        Self { ledger, config }
    }

    /// Verify a proof, optionally against the original bytes.
    pub async fn verify(
        &self,
        proof: &TimestampProof,
        original: Option<&[u8]>,
    ) -> Result<VerificationReport, VerifyError> {
        let content_digest = original.map(|bytes| digest(bytes, proof.algorithm));
        self.verify_digest(proof, content_digest).await
    }

    /// Verify a proof against an already computed content digest (e.g. from
    /// a streamed file). The digest must use `proof.algorithm`.
    pub async fn verify_digest(
        &self,
        proof: &TimestampProof,
        content_digest: Option<Digest>,
    ) -> Result<VerificationReport, VerifyError> {
        check_version(u64::from(proof.version))?;

        let mut report = VerificationReport {
            verdict: Verdict::Unconfirmed,
            digest: proof.digest,
            content_digest,
            checks: Vec::new(),
        };

        if let Some(actual) = content_digest {
            if actual != proof.digest {
                tracing::warn!(expected = %proof.digest, %actual, "Content does not match proof");
                report.verdict = Verdict::ContentMismatch;
                return Ok(report);
            }
        }

        if proof.attestations.is_empty() {
            tracing::info!(digest = %proof.digest, "Proof has no attestations yet");
            return Ok(report);
        }

        let checks = join_all(
            proof
                .attestations
                .iter()
                .enumerate()
                .map(|(index, att)| self.check_attestation(&proof.digest, index, *att)),
        )
        .await;

        if !checks.iter().any(AttestationCheck::is_judged) {
            let outage = checks
                .iter()
                .find_map(|c| c.error.clone().map(|source| (c.index, source)));
            if let Some((index, source)) = outage {
                return Err(VerifyError::Ledger { index, source });
            }
        }

        report.verdict = aggregate(&checks);
        report.checks = checks;

        tracing::info!(
            digest = %proof.digest,
            verdict = %report.verdict,
            attestations = report.checks.len(),
            "Verification finished"
        );
        Ok(report)
    }

    async fn check_attestation(
        &self,
        expected: &Digest,
        index: usize,
        attestation: Attestation,
    ) -> AttestationCheck {
        let fetch = self.ledger.fetch_memo(attestation.network, &attestation.txid);
        let memo = with_timeout(self.config.call_timeout, fetch).await;

        let mut check = AttestationCheck {
            index,
            attestation,
            verdict: None,
            memo_digest: None,
            detail: None,
            error: None,
        };

        match memo {
            Ok(memo) => match parse_timestamp_memo(&memo, attestation.memo_offset) {
                Some(found) if found == *expected => {
                    check.verdict = Some(Verdict::Valid);
                    check.memo_digest = Some(found);
                }
                Some(found) => {
                    check.verdict = Some(Verdict::DigestMismatch);
                    check.memo_digest = Some(found);
                    check.detail = Some(format!("memo carries {found}"));
                }
                None => {
                    check.verdict = Some(Verdict::DigestMismatch);
                    check.detail = Some(format!(
                        "memo has no timestamp payload at offset {}",
                        attestation.memo_offset
                    ));
                }
            },
            Err(LedgerError::TransactionNotFound(msg)) => {
                check.verdict = Some(Verdict::TransactionNotFound);
                check.detail = Some(msg);
            }
            Err(LedgerError::MemoUnreadable(msg)) => {
                check.verdict = Some(Verdict::MemoUnreadable);
                check.detail = Some(msg);
            }
            Err(outage) => {
                tracing::warn!(
                    index,
                    txid = %attestation.txid,
                    error = %outage,
                    "Ledger unavailable"
                );
                check.detail = Some(outage.to_string());
                check.error = Some(outage);
                return check;
            }
        }

        tracing::debug!(
            index,
            txid = %attestation.txid,
            network = %attestation.network,
            verdict = ?check.verdict,
            "Attestation checked"
        );
        check
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("ledger", &self.ledger.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Combine the verdicts of the attestations that could be judged.
///
/// A mismatch anywhere taints the proof. Otherwise one valid anchor is
/// enough; with none, the first judged attestation's failure is reported.
fn aggregate(checks: &[AttestationCheck]) -> Verdict {
    let mut judged = checks.iter().filter_map(|c| c.verdict);
    if judged.clone().any(|v| v == Verdict::DigestMismatch) {
        Verdict::DigestMismatch
    } else if judged.clone().any(|v| v == Verdict::Valid) {
        Verdict::Valid
    } else {
        judged.next().unwrap_or(Verdict::Unconfirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;
    use crate::ledger::Confirmation;
    use crate::memo::create_timestamp_memo;
    use crate::types::{Network, TxId};
    use async_trait::async_trait;
    use std::collections::HashMap;

    enum Entry {
        Memo(Vec<u8>),
        Unreadable,
        Down,
    }

    /// Serves canned memos keyed by (network, txid).
    #[derive(Default)]
    struct MemoLedger {
        entries: HashMap<(Network, [u8; 32]), Entry>,
    }

    impl MemoLedger {
        fn with(mut self, network: Network, txid: u8, entry: Entry) -> Self {
            self.entries.insert((network, [txid; 32]), entry);
            self
        }
    }

    #[async_trait]
    impl Ledger for MemoLedger {
        fn name(&self) -> &str {
            "memo-fixture"
        }

        async fn publish_digest(&self, _digest: &Digest) -> Result<TxId, LedgerError> {
            Err(LedgerError::Unavailable("read-only".into()))
        }

        async fn poll_confirmation(
            &self,
            _txid: &TxId,
        ) -> Result<Option<Confirmation>, LedgerError> {
            Ok(None)
        }

        async fn fetch_memo(&self, network: Network, txid: &TxId) -> Result<Vec<u8>, LedgerError> {
            match self.entries.get(&(network, *txid.as_internal())) {
                Some(Entry::Memo(memo)) => Ok(memo.clone()),
                Some(Entry::Unreadable) => {
                    Err(LedgerError::MemoUnreadable("no viewing key".into()))
                }
                Some(Entry::Down) => Err(LedgerError::Unavailable("connection refused".into())),
                None => Err(LedgerError::TransactionNotFound(txid.to_string())),
            }
        }
    }

    const CONTENT: &[u8] = b"hello world";

    fn proof_with(txids: &[(Network, u8)]) -> TimestampProof {
        let mut proof = TimestampProof::new(
            digest(CONTENT, DigestAlgorithm::Sha256),
            DigestAlgorithm::Sha256,
        );
        for (i, (net, txid)) in txids.iter().enumerate() {
            proof.add_attestation(Attestation::new(
                *net,
                TxId::from_internal([*txid; 32]),
                1000 + i as u32,
                1_700_000_000 + i as u32,
                0,
            ));
        }
        proof
    }

    fn verifier(ledger: MemoLedger) -> Verifier {
        Verifier::new(Arc::new(ledger), VerifyConfig::default())
    }

    fn good_memo() -> Entry {
        Entry::Memo(create_timestamp_memo(&digest(CONTENT, DigestAlgorithm::Sha256)))
    }

    fn forged_memo() -> Entry {
        Entry::Memo(create_timestamp_memo(&Digest::new([0xee; 32])))
    }

    #[tokio::test]
    async fn test_pending_proof_is_unconfirmed() {
        let report = verifier(MemoLedger::default())
            .verify(&proof_with(&[]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Unconfirmed);
        assert!(report.checks.is_empty());
    }

    #[tokio::test]
    async fn test_valid_single_attestation() {
        let ledger = MemoLedger::default().with(Network::Testnet, 1, good_memo());
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), Some(CONTENT))
            .await
            .unwrap();
        assert!(report.is_valid());
        assert_eq!(report.checks[0].verdict, Some(Verdict::Valid));
        assert_eq!(report.attested_time().unwrap().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_content_mismatch_short_circuits() {
        // Ledger would fail loudly if asked
        let ledger = MemoLedger::default().with(Network::Testnet, 1, Entry::Down);
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), Some(&b"hello world!"[..]))
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::ContentMismatch);
        assert!(report.checks.is_empty());
        assert!(report.content_digest.is_some());
    }

    #[tokio::test]
    async fn test_forged_memo_is_digest_mismatch() {
        let ledger = MemoLedger::default().with(Network::Testnet, 1, forged_memo());
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::DigestMismatch);
        assert_eq!(report.checks[0].memo_digest, Some(Digest::new([0xee; 32])));
    }

    #[tokio::test]
    async fn test_memo_without_payload_is_digest_mismatch() {
        let ledger = MemoLedger::default().with(Network::Testnet, 1, Entry::Memo(vec![0u8; 512]));
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::DigestMismatch);
        assert_eq!(report.checks[0].memo_digest, None);
    }

    #[tokio::test]
    async fn test_mismatch_beats_valid() {
        let ledger = MemoLedger::default()
            .with(Network::Testnet, 1, good_memo())
            .with(Network::Mainnet, 2, forged_memo());
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1), (Network::Mainnet, 2)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::DigestMismatch);
        assert_eq!(report.checks[0].verdict, Some(Verdict::Valid));
        assert_eq!(report.checks[1].verdict, Some(Verdict::DigestMismatch));
    }

    #[tokio::test]
    async fn test_one_valid_with_missing_is_valid() {
        let ledger = MemoLedger::default().with(Network::Mainnet, 2, good_memo());
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1), (Network::Mainnet, 2)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Valid);
        assert_eq!(report.checks[0].verdict, Some(Verdict::TransactionNotFound));
        assert_eq!(report.checks[1].index, 1);
    }

    #[tokio::test]
    async fn test_wrong_network_not_found() {
        let ledger = MemoLedger::default().with(Network::Mainnet, 1, good_memo());
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::TransactionNotFound);
    }

    #[tokio::test]
    async fn test_unreadable_memo() {
        let ledger = MemoLedger::default().with(Network::Testnet, 1, Entry::Unreadable);
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::MemoUnreadable);
        assert_eq!(report.checks[0].detail.as_deref(), Some("no viewing key"));
    }

    #[tokio::test]
    async fn test_unavailable_ledger_is_error() {
        let ledger = MemoLedger::default().with(Network::Testnet, 1, Entry::Down);
        let err = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1)]), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Ledger {
                index: 0,
                source: LedgerError::Unavailable(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_outage_on_one_attestation_keeps_the_others() {
        let ledger = MemoLedger::default()
            .with(Network::Testnet, 1, good_memo())
            .with(Network::Testnet, 2, Entry::Down);
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1), (Network::Testnet, 2)]), None)
            .await
            .unwrap();

        assert_eq!(report.verdict, Verdict::Valid);
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.checks[0].verdict, Some(Verdict::Valid));
        assert!(!report.checks[1].is_judged());
        assert!(matches!(
            report.checks[1].error,
            Some(LedgerError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_outage_does_not_hide_mismatch() {
        let ledger = MemoLedger::default()
            .with(Network::Testnet, 1, Entry::Down)
            .with(Network::Testnet, 2, forged_memo());
        let report = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1), (Network::Testnet, 2)]), None)
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::DigestMismatch);
    }

    #[tokio::test]
    async fn test_every_attestation_down_is_error() {
        let ledger = MemoLedger::default()
            .with(Network::Testnet, 1, Entry::Down)
            .with(Network::Testnet, 2, Entry::Down);
        let err = verifier(ledger)
            .verify(&proof_with(&[(Network::Testnet, 1), (Network::Testnet, 2)]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Ledger { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_unsupported_version_rejected() {
        let mut proof = proof_with(&[]);
        proof.version = 2;
        let err = verifier(MemoLedger::default()).verify(&proof, None).await.unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Proof(Error::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_check_content() {
        let proof = proof_with(&[]);
        assert!(check_content(&proof, CONTENT).is_ok());
        assert!(matches!(
            check_content(&proof, b"other"),
            Err(Error::ContentMismatch { .. })
        ));
    }
}
