//! Fire-and-forget mining requests and the worker that services them

use super::{BlockAssembler, MiningLoop};
use crate::chain::Blockchain;
use crate::error::{NodeError, NodeResult};

use ethers::types::H256;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Request to assemble and seal a block right away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MineRequest {
    /// Transaction whose admission caused the request
    pub tx_hash: H256,
}

/// Sending half handed to the submission gateway
#[derive(Clone)]
pub struct MineTrigger {
    tx: mpsc::Sender<MineRequest>,
}

impl MineTrigger {
    /// Create a trigger and the receiver a [`MiningWorker`] consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MineRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a request without waiting for queue space or for the block
    ///
    /// A full queue is reported as an error rather than waited on.
    pub fn request(&self, tx_hash: H256) -> NodeResult<()> {
        self.tx
            .try_send(MineRequest { tx_hash })
            .map_err(|e| match e {
                TrySendError::Full(_) => NodeError::Mining("mining queue full".to_string()),
                TrySendError::Closed(_) => NodeError::Mining("mining worker stopped".to_string()),
            })
    }
}

/// Services mine requests one at a time
pub struct MiningWorker {
    chain: Arc<dyn Blockchain>,
    assembler: Arc<dyn BlockAssembler>,
    miner: Arc<dyn MiningLoop>,
    include_uncles: bool,
}

impl MiningWorker {
    pub fn new(
        chain: Arc<dyn Blockchain>,
        assembler: Arc<dyn BlockAssembler>,
        miner: Arc<dyn MiningLoop>,
        include_uncles: bool,
    ) -> Self {
        Self {
            chain,
            assembler,
            miner,
            include_uncles,
        }
    }

    pub fn spawn(self, rx: mpsc::Receiver<MineRequest>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Run until every [`MineTrigger`] is dropped
    pub async fn run(self, mut rx: mpsc::Receiver<MineRequest>) {
        info!("Mining worker started");
        while let Some(request) = rx.recv().await {
            self.mine(request).await;
        }
        info!("Mining worker stopped");
    }

    /// Build on the current best block and seal; failures end here
    async fn mine(&self, request: MineRequest) {
        let parent = self.chain.best_block().await;
        debug!(
            "Instant mining for {:?} on top of block {}",
            request.tx_hash, parent.number
        );

        if let Err(e) = self
            .assembler
            .build_candidate(parent, self.include_uncles)
            .await
        {
            warn!("Failed to build block for {:?}: {}", request.tx_hash, e);
            crate::metrics::record_mine_trigger_failure("build");
            return;
        }

        if let Err(e) = self.miner.seal_immediately().await {
            warn!("Failed to seal block for {:?}: {}", request.tx_hash, e);
            crate::metrics::record_mine_trigger_failure("seal");
        }
    }
}
