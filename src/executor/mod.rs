//! Speculative execution against the best block without committing state

mod dev;

pub use dev::DevExecutor;

use crate::chain::Block;
use crate::error::NodeResult;
use crate::tx::Transaction;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;

/// Everything a dry run needs: the context block plus the call fields
#[derive(Debug, Clone)]
pub struct SpeculativeCall {
    pub block: Arc<Block>,
    pub fee_recipient: Address,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub from: Address,
}

impl SpeculativeCall {
    /// Project `tx` onto `block`, paying fees to the block's coinbase
    pub fn new(block: Arc<Block>, tx: &Transaction) -> Self {
        Self {
            fee_recipient: block.coinbase,
            block,
            gas_price: tx.gas_price(),
            gas_limit: tx.gas_limit(),
            to: tx.to(),
            value: tx.value(),
            data: tx.data().clone(),
            from: tx.from(),
        }
    }
}

/// Result of a dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub gas_used: u64,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(gas_used: u64) -> Self {
        Self {
            success: true,
            gas_used,
            error: None,
        }
    }

    pub fn failure(gas_used: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            gas_used,
            error: Some(error.into()),
        }
    }
}

/// Executes a transaction as a pure projection
///
/// Implementations must not mutate chain or pool state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeculativeExecutor: Send + Sync {
    async fn execute(&self, call: &SpeculativeCall) -> NodeResult<ExecutionOutcome>;
}
