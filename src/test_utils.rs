//! Shared fakes for unit tests

use crate::chain::{Block, Blockchain};
use crate::error::{NodeError, NodeResult};
use crate::miner::{BlockAssembler, MiningLoop};
use crate::pool::TransactionPool;
use crate::tx::{Transaction, UnsignedTransaction};
use crate::wallet::Account;

use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CHAIN_ID: u64 = 33;

pub const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub fn local_wallet() -> LocalWallet {
    KEY.parse().unwrap()
}

pub fn account() -> Account {
    Account::new(local_wallet())
}

pub fn transfer(nonce: u64) -> UnsignedTransaction {
    UnsignedTransaction {
        nonce: U256::from(nonce),
        gas_price: Some(U256::one()),
        gas_limit: Some(U256::from(21_000)),
        to: Some(Address::from_low_u64_be(0xbb)),
        value: Some(U256::from(16)),
        data: Bytes::default(),
    }
}

pub fn signed(fields: UnsignedTransaction) -> Transaction {
    fields
        .sign(&account(), Some(CHAIN_ID))
        .unwrap()
        .into_checked()
        .unwrap()
}

/// Records the parent of every build and counts seals
#[derive(Default)]
pub struct RecordingMiner {
    pub parents: Mutex<Vec<H256>>,
    pub seals: AtomicUsize,
    pub fail_build: bool,
}

impl RecordingMiner {
    pub fn builds(&self) -> usize {
        self.parents.lock().unwrap().len()
    }

    pub fn seals(&self) -> usize {
        self.seals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockAssembler for RecordingMiner {
    async fn build_candidate(&self, parent: Arc<Block>, include_uncles: bool) -> NodeResult<()> {
        assert!(!include_uncles);
        if self.fail_build {
            return Err(NodeError::Mining("no work".to_string()));
        }
        self.parents.lock().unwrap().push(parent.hash);
        Ok(())
    }
}

#[async_trait]
impl MiningLoop for RecordingMiner {
    async fn seal_immediately(&self) -> NodeResult<()> {
        self.seals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Chain whose head never moves
pub struct FixedChain(pub Arc<Block>);

#[async_trait]
impl Blockchain for FixedChain {
    async fn best_block(&self) -> Arc<Block> {
        self.0.clone()
    }
}

/// Chain whose head moves to the next block on every read, then stays on the last
pub struct AdvancingChain {
    heads: Mutex<VecDeque<Arc<Block>>>,
}

impl AdvancingChain {
    pub fn new(heads: Vec<Arc<Block>>) -> Self {
        assert!(!heads.is_empty());
        Self {
            heads: Mutex::new(heads.into()),
        }
    }
}

#[async_trait]
impl Blockchain for AdvancingChain {
    async fn best_block(&self) -> Arc<Block> {
        let mut heads = self.heads.lock().unwrap();
        if heads.len() > 1 {
            heads.pop_front().unwrap()
        } else {
            heads[0].clone()
        }
    }
}

/// Assembler that never finishes a candidate
pub struct StalledAssembler;

#[async_trait]
impl BlockAssembler for StalledAssembler {
    async fn build_candidate(&self, _parent: Arc<Block>, _include_uncles: bool) -> NodeResult<()> {
        std::future::pending().await
    }
}

/// Pool that records every admission
///
/// The pending nonce of a sender is `start` plus the number of its admitted
/// transactions.
#[derive(Default)]
pub struct RecordingPool {
    pub start: U256,
    pub reject: Option<String>,
    pub submitted: Mutex<Vec<Transaction>>,
}

impl RecordingPool {
    pub fn starting_at(start: u64) -> Self {
        Self {
            start: U256::from(start),
            ..Default::default()
        }
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionPool for RecordingPool {
    async fn pending_nonce(&self, address: &Address) -> U256 {
        let admitted = self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| tx.from() == *address)
            .count();
        self.start + U256::from(admitted)
    }

    async fn submit(&self, tx: Transaction) -> NodeResult<()> {
        if let Some(reason) = &self.reject {
            return Err(NodeError::PoolRejected(reason.clone()));
        }
        self.submitted.lock().unwrap().push(tx);
        Ok(())
    }
}
