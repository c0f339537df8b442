//! In-memory development chain

use super::{Block, Blockchain};
use crate::error::{NodeError, NodeResult};

use async_trait::async_trait;
use ethers::types::{Address, H256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

struct ChainState {
    head: Arc<Block>,
    blocks: Vec<Arc<Block>>,
}

/// Append-only chain starting at a genesis block
pub struct DevChain {
    state: RwLock<ChainState>,
}

impl DevChain {
    pub fn new(coinbase: Address, block_gas_limit: u64) -> Self {
        let genesis = Arc::new(Block::genesis(coinbase, block_gas_limit));
        Self {
            state: RwLock::new(ChainState {
                head: genesis.clone(),
                blocks: vec![genesis],
            }),
        }
    }

    /// Append a block on top of the current head
    pub async fn import(&self, block: Block) -> NodeResult<Arc<Block>> {
        let mut state = self.state.write().await;
        let head = &state.head;

        if block.parent_hash != head.hash || block.number != head.number + 1 {
            return Err(NodeError::Mining(format!(
                "block {} ({:?}) does not extend head {} ({:?})",
                block.number, block.hash, head.number, head.hash
            )));
        }

        info!(
            "Imported block {} {:?} with {} transactions",
            block.number,
            block.hash,
            block.transactions.len()
        );
        let block = Arc::new(block);
        state.blocks.push(block.clone());
        state.head = block.clone();
        Ok(block)
    }

    pub async fn block_number(&self) -> u64 {
        self.best_block().await.number
    }

    /// Block that included the given transaction, if any
    pub async fn find_transaction(&self, hash: &H256) -> Option<Arc<Block>> {
        self.state
            .read()
            .await
            .blocks
            .iter()
            .rev()
            .find(|b| b.transactions.contains(hash))
            .cloned()
    }
}

#[async_trait]
impl Blockchain for DevChain {
    async fn best_block(&self) -> Arc<Block> {
        self.state.read().await.head.clone()
    }
}
