//! Example: stamping a document and verifying the proof
//!
//! Run with: cargo run -p zots-core --example stamp_and_verify
//!
//! Set `RUST_LOG=zots_core=debug` to watch the workflow transitions.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zots_core::{
    classify, decode_any, encode_canonical, encode_compact, CancellationToken, DigestAlgorithm,
    StampConfig, StampState, StampWorkflow, Verifier, VerifyConfig, WaitPolicy,
};
use zots_sim::{SimConfig, SimLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("zOpenTimestamps - Example Usage\n");
    println!("===============================\n");

    // Step 1: Hash the document
    println!("1️⃣  Hashing document...");
    let document: &[u8] = b"Meeting minutes, 2025-01-15: budget approved.";
    let state = StampState::from_bytes(document, DigestAlgorithm::Sha256);
    let digest = state
        .proof()
        .map(|p| p.digest)
        .ok_or_else(|| anyhow::anyhow!("fresh state carries a proof"))?;
    println!("   ✓ SHA-256: {}\n", digest);

    // Step 2: Anchor on a simulated chain (a real deployment plugs in a wallet-backed ledger)
    println!("2️⃣  Publishing digest and waiting for confirmation...");
    let ledger = Arc::new(SimLedger::with_config(SimConfig {
        confirmations_required: 2,
        ..SimConfig::default()
    }));
    let config = StampConfig::default()
        .with_policy(WaitPolicy::new(10, Duration::from_millis(50)));
    let workflow = StampWorkflow::new(ledger.clone(), config);

    let stamped = workflow.run(state, &CancellationToken::new()).await?;
    println!("   ✓ Transaction: {}", stamped.txid());
    println!("{}\n", stamped.proof().summary());

    // Step 3: Encode both ways
    println!("3️⃣  Encoding proof...");
    let compact = encode_compact(stamped.proof())?;
    let canonical = encode_canonical(stamped.proof())?;
    println!("   ✓ Compact ({} chars): {}", compact.len(), compact);
    println!("   ✓ Canonical ({} bytes)\n{}\n", canonical.len(), canonical);

    // Step 4: Decode whatever we were handed
    println!("4️⃣  Decoding...");
    let decoded = decode_any(&compact)?;
    println!("   ✓ Detected {} form", classify(&compact));
    assert_eq!(&decoded, stamped.proof());

    // Step 5: Verify against the original bytes
    println!("\n5️⃣  Verifying...");
    let verifier = Verifier::new(ledger, VerifyConfig::default());
    let report = verifier.verify(&decoded, Some(document)).await?;
    println!("   ✓ Verdict: {}", report.verdict);
    if let Some(when) = report.attested_time() {
        println!("   ✓ Existed by: {}", when.to_rfc3339());
    }

    // Step 6: A tampered document is caught
    println!("\n6️⃣  Verifying a tampered copy...");
    let tampered: &[u8] = b"Meeting minutes, 2025-01-15: budget rejected.";
    let report = verifier.verify(&decoded, Some(tampered)).await?;
    println!("   ✗ Verdict: {}", report.verdict);

    println!("\n✅ Done");
    Ok(())
}
