//! Block assembly and sealing
//!
//! This module provides:
//! - The block-assembly and mining-loop collaborator interfaces
//! - A one-way [`MineTrigger`] and the [`MiningWorker`] task that services it
//! - A development miner sealing pool transactions into the in-memory chain

mod dev;
mod worker;

pub use dev::DevMiner;
pub use worker::{MineRequest, MineTrigger, MiningWorker};

use crate::chain::Block;
use crate::error::NodeResult;

use async_trait::async_trait;
use std::sync::Arc;

/// Assembles unsealed candidate blocks
#[async_trait]
pub trait BlockAssembler: Send + Sync {
    /// Build a candidate on top of `parent`
    async fn build_candidate(&self, parent: Arc<Block>, include_uncles: bool) -> NodeResult<()>;
}

/// Seals the most recently assembled candidate
#[async_trait]
pub trait MiningLoop: Send + Sync {
    async fn seal_immediately(&self) -> NodeResult<()>;
}
