//! Chain module - the best-block view used as execution and assembly context
//!
//! This module provides:
//! - The [`Block`] record and the [`Blockchain`] read interface
//! - An in-memory development chain that sealed blocks are imported into

mod memory;

pub use memory::DevChain;

use crate::tx::Transaction;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use ethers::utils::rlp::RlpStream;
use sha3::{Digest, Keccak256};
use std::sync::Arc;

/// A sealed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: H256,
    pub parent_hash: H256,
    /// Fee recipient
    pub coinbase: Address,
    pub gas_limit: u64,
    pub timestamp: u64,
    pub transactions: Vec<H256>,
}

impl Block {
    /// Block zero
    pub fn genesis(coinbase: Address, gas_limit: u64) -> Self {
        Self::seal(0, H256::zero(), coinbase, gas_limit, 0, Vec::new())
    }

    /// Seal a child of `parent` containing `transactions`
    pub fn child(
        parent: &Block,
        coinbase: Address,
        timestamp: u64,
        transactions: &[Transaction],
    ) -> Self {
        // Monotonic timestamps even when sealing several blocks per second
        let timestamp = timestamp.max(parent.timestamp + 1);
        Self::seal(
            parent.number + 1,
            parent.hash,
            coinbase,
            parent.gas_limit,
            timestamp,
            transactions.iter().map(Transaction::hash).collect(),
        )
    }

    fn seal(
        number: u64,
        parent_hash: H256,
        coinbase: Address,
        gas_limit: u64,
        timestamp: u64,
        transactions: Vec<H256>,
    ) -> Self {
        let mut stream = RlpStream::new_list(6);
        stream.append(&number);
        stream.append(&parent_hash);
        stream.append(&coinbase);
        stream.append(&gas_limit);
        stream.append(&timestamp);
        stream.append_list::<H256, H256>(&transactions);
        let hash = H256::from_slice(&Keccak256::digest(stream.out()));

        Self {
            number,
            hash,
            parent_hash,
            coinbase,
            gas_limit,
            timestamp,
            transactions,
        }
    }
}

/// Read access to the locally accepted chain head
#[async_trait]
pub trait Blockchain: Send + Sync {
    /// Snapshot of the current best block
    ///
    /// Two calls may return different blocks if the chain advanced in between.
    async fn best_block(&self) -> Arc<Block>;
}
