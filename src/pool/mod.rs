//! Transaction pool interface and the admission window guarding it
//!
//! Handles:
//! - The [`TransactionPool`] collaborator contract (pending nonce, submission)
//! - Pool-scoped exclusivity: nonce reads and admissions only happen through an
//!   [`AdmissionWindow`], so two submitters never observe the same pending nonce
//! - An in-memory development pool

mod memory;

pub use memory::{log_admissions, InMemoryPool};

use crate::error::NodeResult;
use crate::tx::Transaction;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Pending-transaction set of the node
#[async_trait]
pub trait TransactionPool: Send + Sync {
    /// Next nonce `address` must use, given the pool's pending view
    async fn pending_nonce(&self, address: &Address) -> U256;

    /// Admit a transaction and hand it to propagation without awaiting it
    ///
    /// Fails with [`crate::error::NodeError::PoolRejected`] when the pool refuses it.
    async fn submit(&self, tx: Transaction) -> NodeResult<()>;
}

/// Shared handle to the pool together with its admission lock
pub struct PoolHandle {
    pool: Arc<dyn TransactionPool>,
    admission: Mutex<()>,
}

impl PoolHandle {
    pub fn new(pool: Arc<dyn TransactionPool>) -> Self {
        Self {
            pool,
            admission: Mutex::new(()),
        }
    }

    /// Enter the pool's exclusive section
    ///
    /// Everything done through the returned window (nonce read, admission)
    /// is serialized against every other window on this handle.
    pub async fn admission(&self) -> AdmissionWindow<'_> {
        AdmissionWindow {
            _guard: self.admission.lock().await,
            pool: self.pool.as_ref(),
        }
    }
}

/// Exclusive access to the pool, released on drop
pub struct AdmissionWindow<'a> {
    _guard: MutexGuard<'a, ()>,
    pool: &'a dyn TransactionPool,
}

impl AdmissionWindow<'_> {
    pub async fn pending_nonce(&self, address: &Address) -> U256 {
        self.pool.pending_nonce(address).await
    }

    /// Submit the transaction to the pool
    pub async fn admit(&self, tx: &Transaction) -> NodeResult<()> {
        self.pool.submit(tx.clone()).await?;
        debug!("Admitted {} from {:?}", tx.hash_string(), tx.from());
        Ok(())
    }
}
