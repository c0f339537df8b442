use super::*;
use crate::chain::{Block, DevChain};
use crate::error::NodeError;
use crate::executor::{DevExecutor, ExecutionOutcome, MockSpeculativeExecutor};
use crate::miner::{DevMiner, MiningWorker};
use crate::pool::{InMemoryPool, TransactionPool};
use crate::test_utils::{
    account, local_wallet, signed, transfer, AdvancingChain, FixedChain, RecordingMiner,
    RecordingPool, StalledAssembler, CHAIN_ID,
};
use crate::tx::UnsignedTransaction;
use crate::wallet::Wallet;

use ethers::signers::Signer;
use ethers::types::{Address, H256, U256};
use std::time::Duration;
use tokio::task::JoinHandle;

fn coinbase() -> Address {
    Address::from_low_u64_be(0xcb)
}

fn sender() -> Address {
    local_wallet().address()
}

fn request(nonce: Option<&str>) -> TransactionRequest {
    TransactionRequest {
        from: format!("{:#x}", sender()),
        to: Some("0x00000000000000000000000000000000000000bb".into()),
        value: Some("0x10".into()),
        gas: Some("0x5208".into()),
        nonce: nonce.map(str::to_string),
        ..Default::default()
    }
}

fn executor_returning(success: bool, times: usize) -> MockSpeculativeExecutor {
    let mut executor = MockSpeculativeExecutor::new();
    executor
        .expect_execute()
        .times(times)
        .returning(move |_| {
            Ok(if success {
                ExecutionOutcome::success(21_000)
            } else {
                ExecutionOutcome::failure(21_000, "reverted")
            })
        });
    executor
}

struct Harness {
    gateway: SubmissionGateway,
    pool: Arc<RecordingPool>,
    miner: Arc<RecordingMiner>,
    head: Arc<Block>,
    worker: JoinHandle<()>,
}

impl Harness {
    fn new(executor: MockSpeculativeExecutor, pool: RecordingPool) -> Self {
        let head = Arc::new(Block::genesis(coinbase(), 6_800_000));
        let chain: Arc<dyn Blockchain> = Arc::new(FixedChain(head.clone()));
        let pool = Arc::new(pool);
        let miner = Arc::new(RecordingMiner::default());

        let (trigger, rx) = MineTrigger::channel(64);
        let worker = MiningWorker::new(chain.clone(), miner.clone(), miner.clone(), false).spawn(rx);

        let gateway = SubmissionGateway::new(
            TransactionBuilder::new(CHAIN_ID),
            Arc::new(Wallet::new([local_wallet()])),
            Arc::new(PoolHandle::new(pool.clone())),
            chain,
            Arc::new(executor),
            Some(trigger),
        );

        Self {
            gateway,
            pool,
            miner,
            head,
            worker,
        }
    }

    /// Drop the gateway and wait until every queued mine request was served
    async fn settle(self) -> (Arc<RecordingPool>, Arc<RecordingMiner>) {
        drop(self.gateway);
        self.worker.await.unwrap();
        (self.pool, self.miner)
    }
}

fn raw_hex(fields: UnsignedTransaction) -> String {
    let wire = fields
        .sign(&account(), Some(CHAIN_ID))
        .unwrap()
        .encode();
    format!("0x{}", hex::encode(wire))
}

#[tokio::test]
async fn test_explicit_nonce_hash_matches_admitted() {
    let harness = Harness::new(executor_returning(true, 1), RecordingPool::starting_at(0));

    let hash = harness
        .gateway
        .send_transaction(&request(Some("0x9")))
        .await
        .unwrap();

    let (pool, _) = harness.settle().await;
    let admitted = pool.submitted();
    assert_eq!(admitted.len(), 1);

    let tx = &admitted[0];
    assert_eq!(tx.hash_string(), hash);
    assert_eq!(tx.from(), sender());
    assert_eq!(tx.to(), Some(Address::from_low_u64_be(0xbb)));
    assert_eq!(tx.value(), U256::from(16));
    assert_eq!(tx.gas_price(), U256::zero());
    assert_eq!(tx.gas_limit(), U256::from(21_000));
    assert_eq!(tx.nonce(), U256::from(9));
    assert!(tx.data().is_empty());
}

#[tokio::test]
async fn test_pool_nonce_assigned_when_absent() {
    let harness = Harness::new(executor_returning(true, 1), RecordingPool::starting_at(5));

    let hash = harness.gateway.send_transaction(&request(None)).await.unwrap();

    let (pool, _) = harness.settle().await;
    let admitted = pool.submitted();
    assert_eq!(admitted[0].nonce(), U256::from(5));
    assert_eq!(admitted[0].value(), U256::from(16));
    assert_eq!(admitted[0].hash_string(), hash);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_get_contiguous_nonces() {
    const CALLS: usize = 16;
    let harness = Arc::new(Harness::new(
        executor_returning(true, CALLS),
        RecordingPool::starting_at(3),
    ));

    let tasks: Vec<_> = (0..CALLS)
        .map(|_| {
            let harness = harness.clone();
            tokio::spawn(async move { harness.gateway.send_transaction(&request(None)).await })
        })
        .collect();

    let mut hashes = Vec::new();
    for result in futures::future::join_all(tasks).await {
        hashes.push(result.unwrap().unwrap());
    }

    let harness = Arc::try_unwrap(harness).unwrap_or_else(|_| panic!("harness still shared"));
    let (pool, miner) = harness.settle().await;

    let nonces: Vec<U256> = pool.submitted().iter().map(Transaction::nonce).collect();
    let expected: Vec<U256> = (3..3 + CALLS as u64).map(U256::from).collect();
    assert_eq!(nonces, expected);

    let mut admitted: Vec<String> = pool.submitted().iter().map(Transaction::hash_string).collect();
    admitted.sort();
    hashes.sort();
    assert_eq!(admitted, hashes);

    assert_eq!(miner.builds(), CALLS);
    assert_eq!(miner.seals(), CALLS);
}

#[tokio::test]
async fn test_raw_missing_fields_never_reach_pool() {
    for missing in ["gas", "gasPrice", "value"] {
        let mut fields = transfer(0);
        match missing {
            "gas" => fields.gas_limit = None,
            "gasPrice" => fields.gas_price = None,
            _ => fields.value = None,
        }

        let harness = Harness::new(executor_returning(true, 0), RecordingPool::default());
        let err = harness
            .gateway
            .send_raw_transaction(&raw_hex(fields))
            .await
            .unwrap_err();

        assert!(
            matches!(err, NodeError::MalformedRawTransaction(ref m) if m == missing),
            "unexpected error {:?}",
            err
        );
        assert!(err.is_invalid_params());

        let (pool, miner) = harness.settle().await;
        assert!(pool.submitted().is_empty());
        assert_eq!(miner.builds(), 0);
    }
}

#[tokio::test]
async fn test_raw_admits_decoded_transaction_unchanged() {
    let harness = Harness::new(executor_returning(true, 1), RecordingPool::default());
    let raw = raw_hex(transfer(4));
    let expected = signed(transfer(4));

    let hash = harness.gateway.send_raw_transaction(&raw).await.unwrap();

    let (pool, _) = harness.settle().await;
    let admitted = pool.submitted();
    assert_eq!(admitted, vec![expected.clone()]);
    assert_eq!(hash, expected.hash_string());
    assert_eq!(format!("0x{}", hex::encode(&admitted[0].encode())), raw);
}

#[tokio::test]
async fn test_raw_garbage_is_invalid_params() {
    let harness = Harness::new(executor_returning(true, 0), RecordingPool::default());

    for raw in ["0xzz", "0x010203"] {
        let err = harness.gateway.send_raw_transaction(raw).await.unwrap_err();
        assert!(matches!(err, NodeError::InvalidParams(_)));
    }

    let (pool, _) = harness.settle().await;
    assert!(pool.submitted().is_empty());
}

#[tokio::test]
async fn test_successful_dry_run_mines_once_on_best_block() {
    let mut executor = MockSpeculativeExecutor::new();
    executor
        .expect_execute()
        .withf(|call| {
            call.fee_recipient == coinbase()
                && call.from == sender()
                && call.value == U256::from(16)
                && call.gas_limit == U256::from(21_000)
                && call.to == Some(Address::from_low_u64_be(0xbb))
        })
        .times(1)
        .returning(|_| Ok(ExecutionOutcome::success(21_000)));
    let harness = Harness::new(executor, RecordingPool::default());
    let head = harness.head.hash;

    let hash = harness.gateway.send_transaction(&request(None)).await.unwrap();

    let (pool, miner) = harness.settle().await;
    assert_eq!(miner.builds(), 1);
    assert_eq!(miner.seals(), 1);
    assert_eq!(*miner.parents.lock().unwrap(), vec![head]);
    assert_eq!(pool.submitted()[0].hash_string(), hash);
}

#[tokio::test]
async fn test_failed_dry_run_does_not_mine() {
    let harness = Harness::new(executor_returning(false, 1), RecordingPool::default());

    let hash = harness.gateway.send_transaction(&request(None)).await.unwrap();

    let (pool, miner) = harness.settle().await;
    assert_eq!(miner.builds(), 0);
    assert_eq!(miner.seals(), 0);
    assert_eq!(pool.submitted()[0].hash_string(), hash);
}

#[tokio::test]
async fn test_executor_error_is_not_surfaced() {
    let mut executor = MockSpeculativeExecutor::new();
    executor
        .expect_execute()
        .times(1)
        .returning(|_| Err(NodeError::Execution("state unavailable".to_string())));
    let harness = Harness::new(executor, RecordingPool::default());

    let raw = raw_hex(transfer(0));
    let hash = harness.gateway.send_raw_transaction(&raw).await.unwrap();

    let (_, miner) = harness.settle().await;
    assert_eq!(hash, signed(transfer(0)).hash_string());
    assert_eq!(miner.builds(), 0);
}

#[tokio::test]
async fn test_unknown_account_rejected_before_pool() {
    let harness = Harness::new(executor_returning(true, 0), RecordingPool::default());
    let mut req = request(None);
    req.from = "0x00000000000000000000000000000000000000aa".into();

    let err = harness.gateway.send_transaction(&req).await.unwrap_err();
    assert!(matches!(err, NodeError::UnknownAccount { .. }));

    let (pool, _) = harness.settle().await;
    assert!(pool.submitted().is_empty());
}

#[tokio::test]
async fn test_pool_rejection_surfaces_without_dry_run() {
    let pool = RecordingPool {
        reject: Some("underpriced".to_string()),
        ..Default::default()
    };
    let harness = Harness::new(executor_returning(true, 0), pool);

    let err = harness.gateway.send_transaction(&request(None)).await.unwrap_err();
    assert!(matches!(err, NodeError::PoolRejected(ref m) if m == "underpriced"));

    let err = harness
        .gateway
        .send_raw_transaction(&raw_hex(transfer(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::PoolRejected(_)));

    let (_, miner) = harness.settle().await;
    assert_eq!(miner.builds(), 0);
}

#[tokio::test]
async fn test_trigger_failure_keeps_submission_result() {
    let harness = Harness::new(executor_returning(true, 1), RecordingPool::default());
    let Harness {
        gateway,
        pool,
        worker,
        ..
    } = harness;
    worker.abort();
    let _ = worker.await;

    let hash = gateway.send_transaction(&request(None)).await.unwrap();
    assert_eq!(pool.submitted()[0].hash_string(), hash);
}

#[tokio::test]
async fn test_disabled_instant_mine_skips_dry_run() {
    let head = Arc::new(Block::genesis(coinbase(), 6_800_000));
    let pool = Arc::new(RecordingPool::default());
    let gateway = SubmissionGateway::new(
        TransactionBuilder::new(CHAIN_ID),
        Arc::new(Wallet::new([local_wallet()])),
        Arc::new(PoolHandle::new(pool.clone())),
        Arc::new(FixedChain(head)),
        Arc::new(executor_returning(true, 0)),
        None,
    );

    gateway.send_transaction(&request(None)).await.unwrap();
    let tx = pool.submitted().remove(0);
    assert_eq!(gateway.accelerate(&tx).await, Acceleration::Disabled);
}

#[tokio::test]
async fn test_failed_dry_run_leaves_transaction_pending() {
    // Gas limit below intrinsic gas fails the dry run of the development executor
    let chain = Arc::new(DevChain::new(coinbase(), 6_800_000));
    let pool = Arc::new(InMemoryPool::new(CHAIN_ID, 6_800_000));
    let miner = Arc::new(RecordingMiner::default());
    let (trigger, rx) = MineTrigger::channel(8);
    let worker = MiningWorker::new(chain.clone(), miner.clone(), miner.clone(), false).spawn(rx);

    let gateway = SubmissionGateway::new(
        TransactionBuilder::new(CHAIN_ID),
        Arc::new(Wallet::new([local_wallet()])),
        Arc::new(PoolHandle::new(pool.clone())),
        chain,
        Arc::new(DevExecutor),
        Some(trigger),
    );

    let mut req = request(None);
    req.gas = Some("0x100".into());
    let hash = gateway.send_transaction(&req).await.unwrap();

    drop(gateway);
    worker.await.unwrap();

    assert_eq!(miner.builds(), 0);
    assert_eq!(pool.pending_nonce(&sender()).await, U256::one());
    assert!(pool.pending().iter().any(|tx| tx.hash_string() == hash));
}

#[tokio::test]
async fn test_instant_mine_end_to_end() {
    let chain = Arc::new(DevChain::new(coinbase(), 6_800_000));
    let pool = Arc::new(InMemoryPool::new(CHAIN_ID, 6_800_000));
    let miner = Arc::new(DevMiner::new(chain.clone(), pool.clone(), coinbase()));
    let (trigger, rx) = MineTrigger::channel(8);
    let worker = MiningWorker::new(chain.clone(), miner.clone(), miner, false).spawn(rx);

    let gateway = SubmissionGateway::new(
        TransactionBuilder::new(CHAIN_ID),
        Arc::new(Wallet::new([local_wallet()])),
        Arc::new(PoolHandle::new(pool.clone())),
        chain.clone(),
        Arc::new(DevExecutor),
        Some(trigger),
    );

    let first = gateway.send_transaction(&request(None)).await.unwrap();
    let second = gateway.send_transaction(&request(None)).await.unwrap();

    drop(gateway);
    worker.await.unwrap();

    // Both transactions were mined, whichever block picked them up
    assert!(pool.is_empty());
    assert_eq!(pool.pending_nonce(&sender()).await, U256::from(2));
    for hash in [first, second] {
        let hash: H256 = hash.parse().unwrap();
        assert!(chain.find_transaction(&hash).await.is_some());
    }
}

#[tokio::test]
async fn test_candidate_built_on_fresh_best_block() {
    let genesis = Arc::new(Block::genesis(coinbase(), 6_800_000));
    let next = Arc::new(Block::child(&genesis, coinbase(), 1, &[]));
    let chain: Arc<dyn Blockchain> =
        Arc::new(AdvancingChain::new(vec![genesis.clone(), next.clone()]));

    let snapshot = genesis.hash;
    let mut executor = MockSpeculativeExecutor::new();
    executor
        .expect_execute()
        .withf(move |call| call.block.hash == snapshot)
        .times(1)
        .returning(|_| Ok(ExecutionOutcome::success(21_000)));

    let pool = Arc::new(RecordingPool::default());
    let miner = Arc::new(RecordingMiner::default());
    let (trigger, rx) = MineTrigger::channel(8);
    let worker = MiningWorker::new(chain.clone(), miner.clone(), miner.clone(), false).spawn(rx);

    let gateway = SubmissionGateway::new(
        TransactionBuilder::new(CHAIN_ID),
        Arc::new(Wallet::new([local_wallet()])),
        Arc::new(PoolHandle::new(pool.clone())),
        chain,
        Arc::new(executor),
        Some(trigger),
    );

    gateway.send_transaction(&request(None)).await.unwrap();
    drop(gateway);
    worker.await.unwrap();

    // Dry run on the snapshot, candidate on the head read afterwards
    assert_eq!(*miner.parents.lock().unwrap(), vec![next.hash]);
    assert_eq!(miner.seals(), 1);
}

#[tokio::test]
async fn test_stalled_worker_does_not_block_callers() {
    let head = Arc::new(Block::genesis(coinbase(), 6_800_000));
    let chain: Arc<dyn Blockchain> = Arc::new(FixedChain(head));
    let pool = Arc::new(RecordingPool::default());
    let miner = Arc::new(RecordingMiner::default());

    let (trigger, rx) = MineTrigger::channel(1);
    let worker =
        MiningWorker::new(chain.clone(), Arc::new(StalledAssembler), miner.clone(), false).spawn(rx);

    let gateway = SubmissionGateway::new(
        TransactionBuilder::new(CHAIN_ID),
        Arc::new(Wallet::new([local_wallet()])),
        Arc::new(PoolHandle::new(pool.clone())),
        chain,
        Arc::new(executor_returning(true, 6)),
        Some(trigger),
    );

    let mut hashes = Vec::new();
    for _ in 0..4 {
        let submitted =
            tokio::time::timeout(Duration::from_secs(2), gateway.send_transaction(&request(None)))
                .await
                .expect("submission waited on the mining queue");
        hashes.push(submitted.unwrap());
    }

    let admitted: Vec<String> = pool.submitted().iter().map(Transaction::hash_string).collect();
    assert_eq!(admitted, hashes);

    // The worker holds at most one request, so a second retry finds the queue full
    let tx = pool.submitted().remove(0);
    gateway.accelerate(&tx).await;
    assert_eq!(gateway.accelerate(&tx).await, Acceleration::TriggerFailed);
    assert_eq!(miner.seals(), 0);

    worker.abort();
}
