//! Development miner: assembles pool transactions and seals them at once

use super::{BlockAssembler, MiningLoop};
use crate::chain::{Block, DevChain};
use crate::error::{NodeError, NodeResult};
use crate::pool::InMemoryPool;
use crate::tx::Transaction;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Unsealed block waiting for [`MiningLoop::seal_immediately`]
struct Candidate {
    parent: Arc<Block>,
    transactions: Vec<Transaction>,
}

/// Block assembler and sealer backed by the in-memory pool and chain
pub struct DevMiner {
    chain: Arc<DevChain>,
    pool: Arc<InMemoryPool>,
    coinbase: Address,
    candidate: Mutex<Option<Candidate>>,
}

impl DevMiner {
    pub fn new(chain: Arc<DevChain>, pool: Arc<InMemoryPool>, coinbase: Address) -> Self {
        Self {
            chain,
            pool,
            coinbase,
            candidate: Mutex::new(None),
        }
    }

    /// Pending transactions that fit in one block, in pool order
    fn select(&self, gas_limit: u64) -> Vec<Transaction> {
        let gas_limit = U256::from(gas_limit);
        let mut used = U256::zero();
        let mut skipped = HashSet::new();
        let mut selected = Vec::new();

        for tx in self.pool.pending() {
            if skipped.contains(&tx.from()) {
                continue;
            }
            if used + tx.gas_limit() > gas_limit {
                // Later nonces of this sender would leave a gap
                skipped.insert(tx.from());
                continue;
            }
            used += tx.gas_limit();
            selected.push(tx);
        }
        selected
    }
}

#[async_trait]
impl BlockAssembler for DevMiner {
    async fn build_candidate(&self, parent: Arc<Block>, include_uncles: bool) -> NodeResult<()> {
        if include_uncles {
            debug!("Development chain has no uncles to include");
        }

        let transactions = self.select(parent.gas_limit);
        debug!(
            "Built candidate on block {} with {} transactions",
            parent.number,
            transactions.len()
        );
        *self.candidate.lock().await = Some(Candidate {
            parent,
            transactions,
        });
        Ok(())
    }
}

#[async_trait]
impl MiningLoop for DevMiner {
    async fn seal_immediately(&self) -> NodeResult<()> {
        let candidate = self
            .candidate
            .lock()
            .await
            .take()
            .ok_or_else(|| NodeError::Mining("no candidate block to seal".to_string()))?;

        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let block = Block::child(
            &candidate.parent,
            self.coinbase,
            timestamp,
            &candidate.transactions,
        );
        let block = self.chain.import(block).await?;

        self.pool.remove_included(&candidate.transactions);
        crate::metrics::record_block_sealed(block.transactions.len());
        info!(
            "Sealed block {} {:?} with {} transactions",
            block.number,
            block.hash,
            block.transactions.len()
        );
        Ok(())
    }
}
