//! Instant-mine node - development chain that mines admitted transactions at once
//!
//! Serves `eth_sendTransaction` and `eth_sendRawTransaction` over JSON-RPC and
//! seals a block for every transaction whose dry run succeeds.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use instant_miner::api::{self, AppState};
use instant_miner::chain::{Blockchain, DevChain};
use instant_miner::config::Settings;
use instant_miner::executor::DevExecutor;
use instant_miner::gateway::SubmissionGateway;
use instant_miner::metrics::MetricsServer;
use instant_miner::miner::{DevMiner, MineTrigger, MiningWorker};
use instant_miner::pool::{log_admissions, InMemoryPool, PoolHandle};
use instant_miner::tx::TransactionBuilder;
use instant_miner::wallet::Wallet;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting instant-mine node v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    let coinbase = settings.coinbase()?;
    info!(
        "Loaded configuration for chain {} (instant mining {})",
        settings.node.chain_id,
        if settings.node.instant_mine { "on" } else { "off" }
    );

    // Collaborators
    let wallet = Arc::new(Wallet::new(settings.wallets()?));
    let chain = Arc::new(DevChain::new(coinbase, settings.node.block_gas_limit));
    let pool = Arc::new(InMemoryPool::new(
        settings.node.chain_id,
        settings.node.block_gas_limit,
    ));
    let pool_handle = Arc::new(PoolHandle::new(pool.clone()));

    // Mining worker, only when instant mining is on
    let (trigger, worker_handle) = if settings.node.instant_mine {
        let miner = Arc::new(DevMiner::new(chain.clone(), pool.clone(), coinbase));
        let (trigger, rx) = MineTrigger::channel(settings.miner.trigger_queue);
        let worker = MiningWorker::new(
            chain.clone(),
            miner.clone(),
            miner,
            settings.miner.include_uncles,
        );
        (Some(trigger), Some(worker.spawn(rx)))
    } else {
        warn!("Instant mining disabled - admitted transactions stay pending");
        (None, None)
    };

    let gateway = Arc::new(SubmissionGateway::new(
        TransactionBuilder::new(settings.node.chain_id),
        wallet.clone(),
        pool_handle.clone(),
        chain.clone(),
        Arc::new(DevExecutor),
        trigger,
    ));
    info!("Submission gateway initialized");

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = AppState {
            gateway,
            pool: pool_handle,
            chain: chain.clone(),
            accounts: wallet,
            coinbase,
            chain_id: settings.node.chain_id,
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Log every admission
    let announce_handle = tokio::spawn(log_admissions(pool.subscribe()));

    info!("Instant-mine node is running");
    info!("JSON-RPC: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // The API task owns the last trigger; the worker drains once it is gone
    api_handle.abort();
    let _ = api_handle.await;
    if let Some(h) = worker_handle {
        if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, h).await.is_err() {
            warn!("Mining worker still busy after {:?}", WORKER_DRAIN_TIMEOUT);
        }
    }

    announce_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!(
        "Instant-mine node stopped at block {}",
        chain.best_block().await.number
    );
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,instant_miner=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
