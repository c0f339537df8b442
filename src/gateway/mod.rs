//! Submission gateway: admits transactions and decides whether to mine at once
//!
//! Both entry points converge on the same sequence:
//! 1. Normalize the input (build and sign, or decode and check presence)
//! 2. Inside the pool admission window: resolve the nonce, finalize, admit
//! 3. Dry-run the admitted transaction on the best block
//! 4. On a successful dry run, ask the mining worker for a block
//!
//! Only step 2 decides the result. Steps 3 and 4 accelerate inclusion and
//! never change the returned hash or turn a success into an error.

use crate::chain::Blockchain;
use crate::error::NodeResult;
use crate::executor::{SpeculativeCall, SpeculativeExecutor};
use crate::miner::MineTrigger;
use crate::pool::PoolHandle;
use crate::tx::request::parse_hex_bytes;
use crate::tx::{Transaction, TransactionBuilder, TransactionRequest, UncheckedTransaction};
use crate::wallet::AccountResolver;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const PATH_CONSTRUCT: &str = "construct";
const PATH_RAW: &str = "raw";

/// What happened after admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceleration {
    /// Instant mining is switched off
    Disabled,
    /// Dry run succeeded and a block was requested
    Triggered,
    /// Dry run failed or errored; the transaction waits for a normal block
    Skipped,
    /// Dry run succeeded but the request could not be queued
    TriggerFailed,
}

/// Entry point for `eth_sendTransaction` and `eth_sendRawTransaction`
pub struct SubmissionGateway {
    builder: TransactionBuilder,
    accounts: Arc<dyn AccountResolver>,
    pool: Arc<PoolHandle>,
    chain: Arc<dyn Blockchain>,
    executor: Arc<dyn SpeculativeExecutor>,
    /// `None` when instant mining is disabled
    trigger: Option<MineTrigger>,
    /// Serializes construct-and-submit calls end to end
    construct_lock: Mutex<()>,
}

impl SubmissionGateway {
    pub fn new(
        builder: TransactionBuilder,
        accounts: Arc<dyn AccountResolver>,
        pool: Arc<PoolHandle>,
        chain: Arc<dyn Blockchain>,
        executor: Arc<dyn SpeculativeExecutor>,
        trigger: Option<MineTrigger>,
    ) -> Self {
        Self {
            builder,
            accounts,
            pool,
            chain,
            executor,
            trigger,
            construct_lock: Mutex::new(()),
        }
    }

    /// Build, sign and submit a transaction for an account held by the node
    ///
    /// Returns the transaction hash as `0x`-prefixed hex.
    pub async fn send_transaction(&self, request: &TransactionRequest) -> NodeResult<String> {
        let started = Instant::now();
        let result = self.construct_and_submit(request).await;

        debug!(
            "eth_sendTransaction({}): {}",
            request,
            result.as_deref().unwrap_or("null")
        );
        self.record(PATH_CONSTRUCT, started, &result);
        result
    }

    /// Submit an already signed, hex-encoded transaction
    ///
    /// Returns the transaction hash as `0x`-prefixed hex.
    pub async fn send_raw_transaction(&self, raw: &str) -> NodeResult<String> {
        let started = Instant::now();
        let result = self.submit_raw(raw).await;

        debug!(
            "eth_sendRawTransaction({}): {}",
            raw,
            result.as_deref().unwrap_or("null")
        );
        self.record(PATH_RAW, started, &result);
        result
    }

    async fn construct_and_submit(&self, request: &TransactionRequest) -> NodeResult<String> {
        let _serial = self.construct_lock.lock().await;

        let prepared = self.builder.prepare(self.accounts.as_ref(), request)?;

        let tx = {
            let window = self.pool.admission().await;
            let nonce = match prepared.request.nonce {
                Some(nonce) => nonce,
                None => window.pending_nonce(&prepared.request.from).await,
            };
            let tx = self.builder.finalize(&prepared, nonce)?;
            window.admit(&tx).await?;
            tx
        };

        self.accelerate(&tx).await;
        Ok(tx.hash_string())
    }

    async fn submit_raw(&self, raw: &str) -> NodeResult<String> {
        let bytes = parse_hex_bytes(raw)?;
        let tx = UncheckedTransaction::decode(&bytes)?.into_checked()?;

        self.pool.admission().await.admit(&tx).await?;

        self.accelerate(&tx).await;
        Ok(tx.hash_string())
    }

    /// Dry-run `tx` and request a block if it would succeed
    async fn accelerate(&self, tx: &Transaction) -> Acceleration {
        let Some(trigger) = &self.trigger else {
            return Acceleration::Disabled;
        };

        let snapshot = self.chain.best_block().await;
        let call = SpeculativeCall::new(snapshot, tx);

        let acceleration = match self.executor.execute(&call).await {
            Ok(outcome) if outcome.success => {
                crate::metrics::record_speculative_execution("success");
                match trigger.request(tx.hash()) {
                    Ok(()) => {
                        crate::metrics::record_mine_triggered();
                        Acceleration::Triggered
                    }
                    Err(e) => {
                        warn!("Could not request block for {}: {}", tx.hash_string(), e);
                        crate::metrics::record_mine_trigger_failure("trigger");
                        Acceleration::TriggerFailed
                    }
                }
            }
            Ok(outcome) => {
                // Stays pending for the next regular block
                debug!(
                    "Dry run of {} failed: {}",
                    tx.hash_string(),
                    outcome.error.as_deref().unwrap_or("unknown")
                );
                crate::metrics::record_speculative_execution("failure");
                Acceleration::Skipped
            }
            Err(e) => {
                warn!("Dry run of {} errored: {}", tx.hash_string(), e);
                crate::metrics::record_speculative_execution("error");
                Acceleration::Skipped
            }
        };

        debug!("Acceleration of {}: {:?}", tx.hash_string(), acceleration);
        acceleration
    }

    fn record(&self, path: &str, started: Instant, result: &NodeResult<String>) {
        match result {
            Ok(_) => crate::metrics::record_tx_submitted(path),
            Err(e) => crate::metrics::record_tx_rejected(path, e),
        }
        crate::metrics::record_submission_latency(path, started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests;
