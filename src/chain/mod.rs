//! Chain module - wallet/chain client abstraction and provider management
//!
//! This module provides:
//! - The `ChainClient` seam the swap state machine talks to
//! - Multi-RPC provider management with automatic failover
//! - A per-chain provider cache owned by its creator
//! - Mnemonic-backed wallet clients

pub mod provider;
pub mod wallet;

pub use provider::ChainProvider;
pub use wallet::{EvmWalletClient, WalletClientFactory};

use crate::error::{SwapError, SwapResult};
use crate::models::Network;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use ethers::types::{Address, H256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// On-chain outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

/// Transaction as seen by a chain client
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    pub hash: H256,
    pub confirmations: u64,
    pub status: TxStatus,
}

/// Hex-encoded private key. Never logged, never persisted.
#[derive(Clone)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(hex_key: String) -> Self {
        Self(hex_key)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Wallet/chain client for one (wallet, asset, account)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fails with `SwapError::TransactionNotFound` while the hash is unknown
    async fn get_transaction_by_hash(&self, hash: H256) -> SwapResult<ChainTransaction>;

    async fn export_private_key(&self) -> SwapResult<PrivateKey>;

    async fn get_addresses(&self, start: u32, count: u32) -> SwapResult<Vec<Address>>;
}

/// Resolves chain clients for wallet accounts
pub trait ClientFactory: Send + Sync {
    fn client(
        &self,
        network: Network,
        wallet_id: &str,
        asset: &str,
        account_id: &str,
    ) -> SwapResult<Arc<dyn ChainClient>>;
}

/// Memoizing provider cache keyed by chain id. Entries live as long as the
/// cache; the key space is the configured chain set.
pub struct ProviderCache {
    /// RPC endpoints indexed by chain ID
    endpoints: HashMap<u64, Vec<String>>,
    /// Providers created so far, indexed by chain ID
    providers: DashMap<u64, Arc<ChainProvider>>,
}

impl ProviderCache {
    pub fn new(endpoints: HashMap<u64, Vec<String>>) -> Self {
        Self {
            endpoints,
            providers: DashMap::new(),
        }
    }

    /// Get (or lazily create) the provider for a chain
    pub fn get(&self, chain_id: u64) -> SwapResult<Arc<ChainProvider>> {
        if let Some(provider) = self.providers.get(&chain_id) {
            return Ok(provider.clone());
        }

        let urls = self
            .endpoints
            .get(&chain_id)
            .ok_or_else(|| SwapError::Config(format!("Chain {} not configured", chain_id)))?;
        let provider = Arc::new(ChainProvider::new(chain_id, urls)?);
        debug!("Created provider for chain {}", chain_id);

        Ok(self
            .providers
            .entry(chain_id)
            .or_insert(provider)
            .value()
            .clone())
    }

    /// Chain IDs with a live provider
    pub fn cached_chains(&self) -> Vec<u64> {
        self.providers.iter().map(|e| *e.key()).collect()
    }

    /// Health check for all providers created so far
    pub async fn health_check(&self) -> Vec<(u64, bool)> {
        let providers: Vec<_> = self
            .providers
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        join_all(providers.into_iter().map(|(chain_id, provider)| async move {
            let healthy = provider.health_check().await;
            crate::metrics::record_chain_health(chain_id, healthy);
            (chain_id, healthy)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_cache_memoizes_per_chain() {
        let mut endpoints = HashMap::new();
        endpoints.insert(1, vec!["http://localhost:8545".to_string()]);
        endpoints.insert(137, vec!["http://localhost:8546".to_string()]);
        let cache = ProviderCache::new(endpoints);

        let first = cache.get(1).unwrap();
        let second = cache.get(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let polygon = cache.get(137).unwrap();
        assert!(!Arc::ptr_eq(&first, &polygon));

        let mut cached = cache.cached_chains();
        cached.sort();
        assert_eq!(cached, vec![1, 137]);
    }

    #[test]
    fn test_provider_cache_unknown_chain() {
        let cache = ProviderCache::new(HashMap::new());
        assert!(matches!(cache.get(10), Err(SwapError::Config(_))));
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key = PrivateKey::new("0xdeadbeef".to_string());
        assert!(!format!("{:?}", key).contains("dead"));
    }
}
