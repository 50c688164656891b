//! Simulated ledger for zOpenTimestamps.
//!
//! An in-memory chain implementing [`zots_core::Ledger`]: digests are embedded
//! in memo transactions, blocks are produced as confirmation polls arrive, and
//! memos are served back for verification.
//!
//! ## Failure injection
//! - rejected broadcasts
//! - stalled block production (never confirms)
//! - dropped transactions (reorg / wrong data)
//! - unreadable memos (missing viewing key)
//! - tampered memos

use async_trait::async_trait;
use sha2::{Digest as _, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use zots_core::{
    create_timestamp_memo, Confirmation, Digest, Ledger, LedgerError, Network, TxId,
};

/// Simulated chain parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Network this chain pretends to be
    pub network: Network,
    /// Chain tip at construction
    pub start_height: u32,
    /// Block time of the starting tip (Unix seconds)
    pub genesis_time: u32,
    /// Seconds between blocks
    pub block_interval_secs: u32,
    /// Blocks produced per confirmation poll
    pub blocks_per_poll: u32,
    /// Depth required before a transaction reports as confirmed
    pub confirmations_required: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            start_height: 3_717_528,
            genesis_time: 1_734_000_000,
            block_interval_secs: 75, // Zcash target spacing
            blocks_per_poll: 1,
            confirmations_required: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct SimTx {
    memo: Vec<u8>,
    mined_at: Option<(u32, u32)>,
}

#[derive(Debug, Default)]
struct ChainState {
    height: u32,
    next_nonce: u64,
    mempool: Vec<TxId>,
    txs: HashMap<TxId, SimTx>,
    reject_reason: Option<String>,
    stalled: bool,
    unreadable: HashSet<TxId>,
}

/// In-memory ledger. Cheap to clone; clones share the same chain.
#[derive(Debug, Clone)]
pub struct SimLedger {
    config: SimConfig,
    state: Arc<RwLock<ChainState>>,
}

impl SimLedger {
    /// Create a simulated testnet chain with default parameters.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let state = ChainState {
            height: config.start_height,
            ..ChainState::default()
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    /// Current chain tip.
    pub async fn height(&self) -> u32 {
        self.state.read().await.height
    }

    fn block_time(&self, height: u32) -> u32 {
        let blocks = height.saturating_sub(self.config.start_height);
        self.config
            .genesis_time
            .saturating_add(blocks.saturating_mul(self.config.block_interval_secs))
    }

    /// Produce one block, mining everything in the mempool. Returns the new tip.
    pub async fn mine_block(&self) -> u32 {
        let mut state = self.state.write().await;
        self.mine_locked(&mut state)
    }

    fn mine_locked(&self, state: &mut ChainState) -> u32 {
        state.height += 1;
        let height = state.height;
        let time = self.block_time(height);

        let pending = std::mem::take(&mut state.mempool);
        for txid in &pending {
            if let Some(tx) = state.txs.get_mut(txid) {
                tx.mined_at = Some((height, time));
            }
        }

        tracing::debug!(height, mined = pending.len(), "Simulated block produced");
        height
    }

    /// Reject every broadcast with `reason` (or accept again with `None`).
    pub async fn reject_broadcasts(&self, reason: Option<String>) {
        tracing::info!(?reason, "Broadcast rejection toggled");
        self.state.write().await.reject_reason = reason;
    }

    /// Stop (or resume) block production.
    pub async fn set_stalled(&self, stalled: bool) {
        tracing::info!(stalled, "Block production toggled");
        self.state.write().await.stalled = stalled;
    }

    /// Forget a transaction, as after a reorg.
    pub async fn drop_transaction(&self, txid: &TxId) {
        let mut state = self.state.write().await;
        state.txs.remove(txid);
        state.mempool.retain(|t| t != txid);
        tracing::info!(%txid, "Transaction dropped");
    }

    /// Make a transaction's memo undecryptable.
    pub async fn hide_memo(&self, txid: &TxId) {
        self.state.write().await.unreadable.insert(*txid);
    }

    /// Overwrite a transaction's memo. Returns false if the transaction is unknown.
    pub async fn replace_memo(&self, txid: &TxId, memo: Vec<u8>) -> bool {
        match self.state.write().await.txs.get_mut(txid) {
            Some(tx) => {
                tx.memo = memo;
                true
            }
            None => false,
        }
    }

    /// Broadcast an arbitrary memo and mine it immediately.
    pub async fn insert_confirmed(&self, memo: Vec<u8>) -> (TxId, Confirmation) {
        let mut state = self.state.write().await;
        let txid = self.broadcast_locked(&mut state, memo);
        let height = self.mine_locked(&mut state);
        let confirmation = Confirmation {
            network: self.config.network,
            block_height: height,
            block_time: self.block_time(height),
        };
        (txid, confirmation)
    }

    fn broadcast_locked(&self, state: &mut ChainState, memo: Vec<u8>) -> TxId {
        let nonce = state.next_nonce;
        state.next_nonce += 1;

        let mut hasher = Sha256::new();
        hasher.update([self.config.network.tag()]);
        hasher.update(nonce.to_le_bytes());
        hasher.update(&memo);
        let txid = TxId::from_internal(hasher.finalize().into());

        state.txs.insert(txid, SimTx { memo, mined_at: None });
        state.mempool.push(txid);
        txid
    }
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for SimLedger {
    fn name(&self) -> &str {
        match self.config.network {
            Network::Mainnet => "sim-mainnet",
            Network::Testnet => "sim-testnet",
        }
    }

    async fn publish_digest(&self, digest: &Digest) -> Result<TxId, LedgerError> {
        let mut state = self.state.write().await;
        if let Some(reason) = &state.reject_reason {
            return Err(LedgerError::Rejected(reason.clone()));
        }

        let txid = self.broadcast_locked(&mut state, create_timestamp_memo(digest));
        tracing::debug!(%txid, %digest, "Simulated broadcast");
        Ok(txid)
    }

    async fn poll_confirmation(&self, txid: &TxId) -> Result<Option<Confirmation>, LedgerError> {
        let mut state = self.state.write().await;

        if !state.stalled {
            for _ in 0..self.config.blocks_per_poll {
                self.mine_locked(&mut state);
            }
        }

        let tx = state
            .txs
            .get(txid)
            .ok_or_else(|| LedgerError::TransactionNotFound(txid.to_string()))?;

        Ok(match tx.mined_at {
            Some((height, time))
                if state.height - height + 1 >= self.config.confirmations_required =>
            {
                Some(Confirmation {
                    network: self.config.network,
                    block_height: height,
                    block_time: time,
                })
            }
            _ => None,
        })
    }

    async fn fetch_memo(&self, network: Network, txid: &TxId) -> Result<Vec<u8>, LedgerError> {
        if network != self.config.network {
            return Err(LedgerError::TransactionNotFound(format!(
                "{txid} (this ledger serves {}, not {network})",
                self.config.network
            )));
        }

        let state = self.state.read().await;
        let tx = state
            .txs
            .get(txid)
            .ok_or_else(|| LedgerError::TransactionNotFound(txid.to_string()))?;

        if state.unreadable.contains(txid) {
            return Err(LedgerError::MemoUnreadable(format!(
                "no viewing key for {txid}"
            )));
        }
        Ok(tx.memo.clone())
    }
}
