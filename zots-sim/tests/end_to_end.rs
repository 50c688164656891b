//! Stamp -> encode -> decode -> verify against the simulated ledger.

use std::sync::Arc;
use std::time::Duration;
use zots_core::{
    create_timestamp_memo, decode_any, decode_canonical, decode_compact, encode_canonical,
    encode_compact, Attestation, CancellationToken, Digest, DigestAlgorithm, Ledger, LedgerError,
    Network, StampConfig, StampStage, StampState, StampWorkflow, Stamped, TimestampProof,
    Verdict, Verifier, VerifyConfig, WaitPolicy,
};
use zots_core::memo::MEMO_PAYLOAD_OFFSET;
use zots_core::parse_timestamp_memo;
use zots_sim::{SimConfig, SimLedger};

const DOCUMENT: &[u8] = b"quarterly report, final revision";

fn fast_config() -> StampConfig {
    StampConfig::default().with_policy(WaitPolicy::new(5, Duration::from_millis(10)))
}

fn setup(ledger: &SimLedger, config: StampConfig) -> (StampWorkflow, Verifier) {
    let shared = Arc::new(ledger.clone());
    (
        StampWorkflow::new(shared.clone(), config),
        Verifier::new(shared, VerifyConfig::default()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_stamp_and_verify_compact() {
    let ledger = SimLedger::new();
    let (workflow, verifier) = setup(&ledger, fast_config());

    let state = StampState::from_bytes(DOCUMENT, DigestAlgorithm::Sha256);
    let stamped = workflow.run(state, &CancellationToken::new()).await.unwrap();
    assert!(matches!(stamped, Stamped::Proved { .. }));

    let compact = encode_compact(stamped.proof()).unwrap();
    let decoded = decode_compact(&compact).unwrap();
    assert_eq!(&decoded, stamped.proof());

    let report = verifier.verify(&decoded, Some(DOCUMENT)).await.unwrap();
    assert_eq!(report.verdict, Verdict::Valid);
    assert_eq!(report.checks.len(), 1);
    assert_eq!(
        report.attested_time().map(|t| t.timestamp()),
        Some(i64::from(decoded.attestations[0].block_time))
    );
}

#[tokio::test(start_paused = true)]
async fn test_stamp_and_verify_canonical_blake3() {
    let ledger = SimLedger::with_config(SimConfig {
        network: Network::Mainnet,
        confirmations_required: 3,
        ..SimConfig::default()
    });
    let (workflow, verifier) = setup(&ledger, fast_config());

    let d = zots_core::digest(DOCUMENT, DigestAlgorithm::Blake3);
    let stamped = workflow
        .stamp(d, DigestAlgorithm::Blake3, &CancellationToken::new())
        .await
        .unwrap();

    let json = encode_canonical(stamped.proof()).unwrap();
    assert!(json.contains("\"hash_algorithm\": \"blake3\""));
    assert!(json.contains("\"network\": \"mainnet\""));

    let decoded = decode_any(&json).unwrap();
    assert_eq!(decoded.attestations[0].network, Network::Mainnet);

    let report = verifier.verify(&decoded, Some(DOCUMENT)).await.unwrap();
    assert!(report.is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_recorded_offset_points_at_published_payload() {
    let ledger = SimLedger::new();
    let (workflow, verifier) = setup(&ledger, fast_config());

    let stamped = workflow
        .run(
            StampState::from_bytes(b"doc", DigestAlgorithm::Sha256),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let att = stamped.proof().attestations[0];
    assert_eq!(att.memo_offset, MEMO_PAYLOAD_OFFSET);

    let memo = ledger.fetch_memo(att.network, &att.txid).await.unwrap();
    assert_eq!(
        parse_timestamp_memo(&memo, att.memo_offset),
        Some(stamped.proof().digest)
    );

    let report = verifier.verify(stamped.proof(), Some(&b"doc"[..])).await.unwrap();
    assert_eq!(report.verdict, Verdict::Valid);
}

#[tokio::test]
async fn test_no_wait_gives_pending_proof() {
    let ledger = SimLedger::new();
    let (workflow, verifier) = setup(&ledger, StampConfig::default().no_wait());
    let height_before = ledger.height().await;

    let stamped = workflow
        .run(
            StampState::from_bytes(DOCUMENT, DigestAlgorithm::Sha256),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let Stamped::Pending { proof, txid } = stamped else {
        panic!("expected a pending proof");
    };
    assert!(!proof.is_confirmed());
    assert_eq!(ledger.height().await, height_before);

    // A pending proof still round-trips and verifies as unconfirmed
    let decoded = decode_compact(&encode_compact(&proof).unwrap()).unwrap();
    let report = verifier.verify(&decoded, Some(DOCUMENT)).await.unwrap();
    assert_eq!(report.verdict, Verdict::Unconfirmed);

    // Completing it later with the returned txid
    let confirmation = ledger.poll_confirmation(&txid).await.unwrap().unwrap();
    let mut completed = decoded;
    completed.add_attestation(Attestation::from_confirmation(txid, &confirmation));
    let report = verifier.verify(&completed, Some(DOCUMENT)).await.unwrap();
    assert!(report.is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_never_confirming_fails_with_txid() {
    let ledger = SimLedger::new();
    ledger.set_stalled(true).await;
    let (workflow, _) = setup(&ledger, fast_config());

    let err = workflow
        .stamp(
            Digest::new([3; 32]),
            DigestAlgorithm::Sha256,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, StampStage::Confirm);
    assert_eq!(err.source, LedgerError::NotConfirmed { attempts: 5 });
    assert!(err.txid.is_some());
}

#[tokio::test]
async fn test_rejected_broadcast_fails_at_submit() {
    let ledger = SimLedger::new();
    ledger.reject_broadcasts(Some("insufficient funds".into())).await;
    let (workflow, _) = setup(&ledger, fast_config());

    let err = workflow
        .stamp(
            Digest::new([4; 32]),
            DigestAlgorithm::Sha256,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, StampStage::Submit);
    assert_eq!(err.txid, None);
    assert_eq!(err.source, LedgerError::Rejected("insufficient funds".into()));
}

#[tokio::test(start_paused = true)]
async fn test_tampered_memo_is_digest_mismatch() {
    let ledger = SimLedger::new();
    let (workflow, verifier) = setup(&ledger, fast_config());

    let stamped = workflow
        .run(
            StampState::from_bytes(DOCUMENT, DigestAlgorithm::Sha256),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let forged = create_timestamp_memo(&Digest::new([0xee; 32]));
    assert!(ledger.replace_memo(&stamped.txid(), forged).await);

    let report = verifier.verify(stamped.proof(), Some(DOCUMENT)).await.unwrap();
    assert_eq!(report.verdict, Verdict::DigestMismatch);
    assert_eq!(report.checks[0].memo_digest, Some(Digest::new([0xee; 32])));
}

#[tokio::test]
async fn test_forged_proof_against_foreign_memo() {
    // Attestation points at a real transaction carrying someone else's digest
    let ledger = SimLedger::new();
    let (txid, confirmation) = ledger
        .insert_confirmed(create_timestamp_memo(&Digest::new([0x42; 32])))
        .await;

    let mut proof = TimestampProof::new(
        zots_core::digest(DOCUMENT, DigestAlgorithm::Sha256),
        DigestAlgorithm::Sha256,
    );
    proof.add_attestation(Attestation::from_confirmation(txid, &confirmation));

    let verifier = Verifier::new(Arc::new(ledger), VerifyConfig::default());
    let report = verifier.verify(&proof, Some(DOCUMENT)).await.unwrap();
    assert_eq!(report.verdict, Verdict::DigestMismatch);
}

#[tokio::test(start_paused = true)]
async fn test_content_mismatch_and_missing_transaction() {
    let ledger = SimLedger::new();
    let (workflow, verifier) = setup(&ledger, fast_config());

    let stamped = workflow
        .run(
            StampState::from_bytes(DOCUMENT, DigestAlgorithm::Sha256),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let proof = decode_canonical(&encode_canonical(stamped.proof()).unwrap()).unwrap();

    let report = verifier.verify(&proof, Some(&b"tampered document"[..])).await.unwrap();
    assert_eq!(report.verdict, Verdict::ContentMismatch);

    ledger.hide_memo(&stamped.txid()).await;
    let report = verifier.verify(&proof, None).await.unwrap();
    assert_eq!(report.verdict, Verdict::MemoUnreadable);

    ledger.drop_transaction(&stamped.txid()).await;
    let report = verifier.verify(&proof, None).await.unwrap();
    assert_eq!(report.verdict, Verdict::TransactionNotFound);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_before_confirmation() {
    let ledger = SimLedger::new();
    ledger.set_stalled(true).await;
    let (workflow, _) = setup(
        &ledger,
        StampConfig::default().with_policy(WaitPolicy::new(100, Duration::from_secs(30))),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(45)).await;
        trigger.cancel();
    });

    let err = workflow
        .stamp(Digest::new([5; 32]), DigestAlgorithm::Sha256, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.source, LedgerError::Cancelled);
    assert!(err.txid.is_some());
}
