//! Swap engine: resumes stored swaps and drives each on its own task

use crate::chain::ProviderCache;
use crate::config::ServiceConfig;
use crate::error::SwapResult;
use crate::swap::SwapStateMachine;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct SwapEngine {
    machine: Arc<SwapStateMachine>,
    providers: Arc<ProviderCache>,
    config: ServiceConfig,
    /// Swaps with a live driver task
    driving: Arc<DashMap<Uuid, ()>>,
    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
}

impl SwapEngine {
    pub fn new(
        machine: Arc<SwapStateMachine>,
        providers: Arc<ProviderCache>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            machine,
            providers,
            config,
            driving: Arc::new(DashMap::new()),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Main loop: scan for active swaps and check provider health
    pub async fn run(&self) -> SwapResult<()> {
        let mut scan_interval = interval(Duration::from_millis(self.config.scan_interval_ms));
        let mut health_interval =
            interval(Duration::from_secs(self.config.health_check_interval_secs));

        info!("Swap engine started");

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tokio::select! {
                _ = scan_interval.tick() => {
                    if let Err(e) = self.scan().await {
                        error!("Error scanning active swaps: {}", e);
                    }
                }

                _ = health_interval.tick() => {
                    for (chain_id, healthy) in self.providers.health_check().await {
                        if !healthy {
                            warn!("Chain {} is unhealthy", chain_id);
                        }
                    }
                }
            }
        }

        info!("Swap engine stopped");
        Ok(())
    }

    /// Spawn a driver for every active swap that has none
    pub async fn scan(&self) -> SwapResult<usize> {
        let active = self.machine.store().list_active().await?;
        let mut spawned = 0;

        for swap in active {
            if self.driving.insert(swap.id, ()).is_some() {
                continue;
            }
            spawned += 1;
            debug!("Driving swap {} from {}", swap.id, swap.status);

            let machine = self.machine.clone();
            let driving = self.driving.clone();
            let id = swap.id;
            tokio::spawn(async move {
                match machine.run_to_completion(id).await {
                    Ok(swap) => debug!("Driver for swap {} ended in {}", id, swap.status),
                    Err(e) => error!("Driver for swap {} failed: {}", id, e),
                }
                driving.remove(&id);
            });
        }

        Ok(spawned)
    }

    pub fn driving_count(&self) -> usize {
        self.driving.len()
    }

    /// Stop the engine and every polling cycle
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        self.machine.scheduler().stop().await;
        info!("Swap engine shutdown initiated");
    }
}
