//! Ledger collaborator interface.
//!
//! The proof subsystem never talks to a chain directly. A wallet/ledger
//! implementation embeds digests in transactions, reports confirmations and
//! returns decrypted memos through this trait.

use crate::types::{Digest, Network, TxId};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Block data observed once the anchoring transaction is mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub network: Network,
    pub block_height: u32,
    /// Block timestamp (Unix seconds)
    pub block_time: u32,
}

/// Errors reported by (or while waiting on) a ledger collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Memo unreadable: {0}")]
    MemoUnreadable(String),

    #[error("Broadcast rejected: {0}")]
    Rejected(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Transaction not confirmed after {attempts} attempts")]
    NotConfirmed { attempts: u32 },

    #[error("Ledger call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Bounded confirmation polling with capped exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    /// Maximum number of confirmation polls
    pub max_attempts: u32,
    /// Delay after the first unsuccessful poll
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied per attempt
    pub backoff_multiplier: f64,
    /// Timeout for each individual poll (`None` = unbounded)
    pub poll_timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 1.5,
            poll_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl WaitPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay.max(Self::default().max_delay),
            ..Self::default()
        }
    }

    /// Delay to sleep after the given (0-indexed) unsuccessful attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let growth = self.backoff_multiplier.max(1.0).powi(exponent);
        let scaled = self.initial_delay.as_secs_f64() * growth;
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}

/// Run a ledger call with an optional timeout.
pub async fn with_timeout<T, F>(timeout: Option<Duration>, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| LedgerError::Timeout(limit))?,
        None => call.await,
    }
}

/// Run a future unless the token fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LedgerError::Cancelled),
        result = call => result,
    }
}

/// Wallet/ledger collaborator.
///
/// Implementations own keys, transaction construction, broadcast and memo
/// decryption. Retrying failed calls is their business, not the caller's.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Human-readable backend name (for logs).
    fn name(&self) -> &str;

    /// Embed the digest in a transaction memo and broadcast it.
    async fn publish_digest(&self, digest: &Digest) -> Result<TxId, LedgerError>;

    /// Single confirmation check. `Ok(None)` means not mined yet.
    async fn poll_confirmation(&self, txid: &TxId) -> Result<Option<Confirmation>, LedgerError>;

    /// Fetch the transaction and return its decrypted memo bytes.
    async fn fetch_memo(&self, network: Network, txid: &TxId) -> Result<Vec<u8>, LedgerError>;

    /// Poll until confirmed, the attempt budget runs out, or `cancel` fires.
    ///
    /// Timed-out polls count as unconfirmed attempts; any other error ends the
    /// wait immediately.
    async fn await_confirmation(
        &self,
        txid: &TxId,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<Confirmation, LedgerError> {
        for attempt in 0..policy.max_attempts {
            tracing::debug!(
                ledger = self.name(),
                %txid,
                "Confirmation check {} of {}",
                attempt + 1,
                policy.max_attempts
            );

            let poll = with_timeout(policy.poll_timeout, self.poll_confirmation(txid));
            match cancellable(cancel, poll).await {
                Ok(Some(confirmation)) => return Ok(confirmation),
                Ok(None) => {}
                Err(LedgerError::Timeout(limit)) => {
                    tracing::warn!(%txid, "Confirmation poll timed out after {:?}", limit);
                }
                Err(e) => return Err(e),
            }

            if attempt + 1 < policy.max_attempts {
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(%txid, "Not confirmed yet, waiting {:?}", delay);
                cancellable(cancel, async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
        }

        Err(LedgerError::NotConfirmed {
            attempts: policy.max_attempts,
        })
    }
}
