//! Bridge Swap service - quotes, submits and tracks cross-chain swaps
//!
//! Loads swap records from the store on startup and drives every swap that
//! has not reached a terminal status.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use bridge_swap::api::{self, AppState};
use bridge_swap::bridge::{ChainBridgeGateway, HopSdk};
use bridge_swap::chain::{ProviderCache, WalletClientFactory};
use bridge_swap::config::Settings;
use bridge_swap::engine::SwapEngine;
use bridge_swap::indexer::SubgraphIndex;
use bridge_swap::metrics::MetricsServer;
use bridge_swap::models::AssetRegistry;
use bridge_swap::scheduler::{BackoffPolicy, RetryScheduler};
use bridge_swap::store::{MemorySwapStore, PgSwapStore, SwapStore};
use bridge_swap::swap::{HopSwapProvider, LoggingBalanceUpdater, SwapStateMachine};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Bridge Swap v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    let network = settings.service.network;
    info!(
        "Loaded configuration for {} chains on {}",
        settings.enabled_chains().len(),
        network
    );

    let registry = Arc::new(AssetRegistry::from_settings(&settings)?);

    let endpoints: HashMap<u64, Vec<String>> = settings
        .enabled_chains()
        .into_iter()
        .map(|(_, chain)| (chain.chain_id, chain.rpc_urls.clone()))
        .collect();
    let providers = Arc::new(ProviderCache::new(endpoints));

    // Bridge, indexer and wallets
    let gateway = Arc::new(ChainBridgeGateway::new(
        Arc::new(HopSdk::from_settings(&settings)?),
        providers.clone(),
        settings.bridge.deadline_secs,
    ));
    let index = Arc::new(SubgraphIndex::new(&settings.indexer)?);
    let clients = Arc::new(WalletClientFactory::new(
        network,
        registry.clone(),
        providers.clone(),
        settings.wallets.clone(),
    ));

    let provider = Arc::new(HopSwapProvider::new(
        gateway,
        index,
        clients.clone(),
        registry.clone(),
        Arc::new(LoggingBalanceUpdater),
        settings.bridge.slippage_bps,
    ));

    // Swap store
    let (store, pg_store): (Arc<dyn SwapStore>, Option<Arc<PgSwapStore>>) =
        match &settings.database {
            Some(database) => {
                let pg = Arc::new(PgSwapStore::new(database).await?);
                info!("Database connection established");
                pg.run_migrations().await?;
                (pg.clone() as Arc<dyn SwapStore>, Some(pg))
            }
            None => {
                warn!("No database configured, swaps will not survive a restart");
                (Arc::new(MemorySwapStore::new()) as Arc<dyn SwapStore>, None)
            }
        };

    let scheduler = Arc::new(RetryScheduler::new(BackoffPolicy::from(
        &settings.service.poll,
    )));
    let machine = Arc::new(SwapStateMachine::new(provider, store, scheduler));
    let engine = Arc::new(SwapEngine::new(
        machine.clone(),
        providers.clone(),
        settings.service.clone(),
    ));
    info!("Swap engine initialized");

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let state = AppState {
            network,
            machine: machine.clone(),
            registry: registry.clone(),
            clients,
            providers: providers.clone(),
        };
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

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

    // Start swap engine
    let engine_handle = tokio::spawn({
        let engine = engine.clone();
        async move {
            if let Err(e) = engine.run().await {
                error!("Swap engine error: {}", e);
            }
        }
    });

    // Database health check loop
    let health_handle = pg_store.map(|pg| {
        let interval = settings.service.health_check_interval_secs;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
                if let Err(e) = pg.health_check().await {
                    warn!("Database health check failed: {}", e);
                }
            }
        })
    });

    info!("Bridge Swap is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Graceful shutdown
    engine.stop().await;

    // Abort background tasks
    api_handle.abort();
    engine_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }
    if let Some(h) = health_handle {
        h.abort();
    }

    info!("Bridge Swap stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_swap=debug,sqlx=warn,hyper=warn"));

    // LOG_FORMAT=json for log shippers
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
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
