//! Chain provider with multi-RPC support and automatic failover

use crate::error::{SwapError, SwapResult};

use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    chain_id: u64,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider. No network I/O happens here.
    pub fn new(chain_id: u64, rpc_urls: &[String]) -> SwapResult<Self> {
        let mut http_providers = Vec::new();

        for url in rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}", chain_id);
                }
                Err(e) => {
                    warn!("Failed to create provider for chain {}: {}", chain_id, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(SwapError::ChainConnection {
                chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            chain_id,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain_id, next);
    }

    /// Get current block number with failover
    pub async fn get_block_number(&self) -> SwapResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_block_number().await {
                Ok(block) => return Ok(block.as_u64()),
                Err(e) => {
                    warn!(
                        "Failed to get block number from chain {}: {}",
                        self.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(SwapError::ChainConnection {
            chain_id: self.chain_id,
            message: "All providers failed".to_string(),
        })
    }

    /// Get transaction by hash with failover
    pub async fn get_transaction(&self, tx_hash: H256) -> SwapResult<Option<Transaction>> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_transaction(tx_hash).await {
                Ok(tx) => return Ok(tx),
                Err(e) => {
                    warn!(
                        "Failed to get transaction {:?} from chain {}: {}",
                        tx_hash, self.chain_id, e
                    );
                    self.failover();
                }
            }
        }

        Err(SwapError::ChainConnection {
            chain_id: self.chain_id,
            message: "All providers failed to get transaction".to_string(),
        })
    }

    /// Get transaction receipt
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> SwapResult<Option<TransactionReceipt>> {
        self.http()
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| SwapError::ChainConnection {
                chain_id: self.chain_id,
                message: e.to_string(),
            })
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.get_block_number().await {
            Ok(_) => true,
            Err(e) => {
                error!("Health check failed for chain {}: {}", self.chain_id, e);
                false
            }
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}
