//! In-memory pending pool with per-sender nonce tracking

use super::TransactionPool;
use crate::error::{NodeError, NodeResult};
use crate::tx::Transaction;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{Address, H256, U256};
use std::collections::BTreeMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Per-sender nonce state
#[derive(Default)]
struct SenderState {
    /// Next nonce expected on chain
    confirmed: U256,
    /// Pending transactions: nonce -> transaction
    pending: BTreeMap<U256, Transaction>,
}

impl SenderState {
    /// First nonce after the contiguous run of pending transactions
    fn next_nonce(&self) -> U256 {
        let mut next = self.confirmed;
        while self.pending.contains_key(&next) {
            next = next.saturating_add(U256::one());
        }
        next
    }

    fn executable(&self) -> impl Iterator<Item = &Transaction> + '_ {
        let mut expected = self.confirmed;
        self.pending.range(self.confirmed..).map_while(move |(nonce, tx)| {
            if *nonce != expected {
                return None;
            }
            expected = expected.saturating_add(U256::one());
            Some(tx)
        })
    }
}

/// Pending-transaction pool for the development node
pub struct InMemoryPool {
    chain_id: u64,
    block_gas_limit: U256,
    senders: DashMap<Address, SenderState>,
    /// Known pending hashes: hash -> sender
    known: DashMap<H256, Address>,
    /// Propagation feed of admitted hashes
    announce: broadcast::Sender<H256>,
}

impl InMemoryPool {
    pub fn new(chain_id: u64, block_gas_limit: u64) -> Self {
        let (announce, _) = broadcast::channel(1024);
        Self {
            chain_id,
            block_gas_limit: U256::from(block_gas_limit),
            senders: DashMap::new(),
            known: DashMap::new(),
            announce,
        }
    }

    /// Subscribe to hashes of newly admitted transactions
    pub fn subscribe(&self) -> broadcast::Receiver<H256> {
        self.announce.subscribe()
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.known.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Executable transactions, ordered by sender then nonce
    pub fn pending(&self) -> Vec<Transaction> {
        let mut senders: Vec<Address> = self.senders.iter().map(|e| *e.key()).collect();
        senders.sort();

        senders
            .iter()
            .filter_map(|sender| self.senders.get(sender))
            .flat_map(|state| state.executable().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Drop transactions that a sealed block included and advance their senders
    pub fn remove_included(&self, included: &[Transaction]) {
        for tx in included {
            let mut state = self.senders.entry(tx.from()).or_default();
            let next = tx.nonce().saturating_add(U256::one());
            if next > state.confirmed {
                state.confirmed = next;
            }

            let confirmed = state.confirmed;
            let stale: Vec<U256> = state.pending.range(..confirmed).map(|(n, _)| *n).collect();
            for nonce in stale {
                if let Some(removed) = state.pending.remove(&nonce) {
                    self.known.remove(&removed.hash());
                }
            }
        }
        debug!("Pool holds {} transactions after block", self.known.len());
    }

    fn check(&self, tx: &Transaction) -> Result<(), String> {
        if let Some(chain_id) = tx.chain_id() {
            if chain_id != self.chain_id {
                return Err(format!("invalid chain id {}", chain_id));
            }
        }
        if tx.gas_limit() > self.block_gas_limit {
            return Err("exceeds block gas limit".to_string());
        }
        if self.known.contains_key(&tx.hash()) {
            return Err("already known".to_string());
        }
        Ok(())
    }
}

/// Log every admitted hash until the pool goes away; returns how many were seen
///
/// Falling behind the feed skips the missed hashes and keeps following it.
pub async fn log_admissions(mut feed: broadcast::Receiver<H256>) -> usize {
    let mut seen = 0;
    loop {
        match feed.recv().await {
            Ok(hash) => {
                seen += 1;
                info!("Pool admitted {:?}", hash);
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("Admission log skipped {} hashes", missed);
            }
            Err(RecvError::Closed) => return seen,
        }
    }
}

#[async_trait]
impl TransactionPool for InMemoryPool {
    async fn pending_nonce(&self, address: &Address) -> U256 {
        self.senders
            .get(address)
            .map(|state| state.next_nonce())
            .unwrap_or_default()
    }

    async fn submit(&self, tx: Transaction) -> NodeResult<()> {
        self.check(&tx).map_err(NodeError::PoolRejected)?;

        let hash = tx.hash();
        {
            let mut state = self.senders.entry(tx.from()).or_default();
            if tx.nonce() < state.confirmed {
                return Err(NodeError::PoolRejected("nonce too low".to_string()));
            }

            if let Some(existing) = state.pending.get(&tx.nonce()) {
                if tx.gas_price() <= existing.gas_price() {
                    return Err(NodeError::PoolRejected(
                        "replacement transaction underpriced".to_string(),
                    ));
                }
                warn!(
                    "Replacing {} with {} for nonce {}",
                    existing.hash_string(),
                    tx.hash_string(),
                    tx.nonce()
                );
                self.known.remove(&existing.hash());
            }

            self.known.insert(hash, tx.from());
            state.pending.insert(tx.nonce(), tx);
        }

        // Nobody listening is fine
        let _ = self.announce.send(hash);
        Ok(())
    }
}
