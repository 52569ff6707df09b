//! Mnemonic-backed EVM wallet clients

use super::{ChainClient, ChainProvider, ChainTransaction, ClientFactory, PrivateKey, ProviderCache, TxStatus};
use crate::config::WalletConfig;
use crate::error::{SwapError, SwapResult};
use crate::models::{AssetRegistry, Network};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::signers::coins_bip39::English;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Chain client for one account of a mnemonic wallet
pub struct EvmWalletClient {
    provider: Arc<ChainProvider>,
    phrase: String,
    account_index: u32,
}

impl EvmWalletClient {
    pub fn new(provider: Arc<ChainProvider>, phrase: String, account_index: u32) -> Self {
        Self {
            provider,
            phrase,
            account_index,
        }
    }

    fn derive(&self, index: u32) -> SwapResult<LocalWallet> {
        MnemonicBuilder::<English>::default()
            .phrase(self.phrase.as_str())
            .index(index)
            .and_then(|builder| builder.build())
            .map_err(|e| SwapError::Wallet(format!("Key derivation failed: {}", e)))
    }
}

#[async_trait]
impl ChainClient for EvmWalletClient {
    async fn get_transaction_by_hash(&self, hash: H256) -> SwapResult<ChainTransaction> {
        let tx = self
            .provider
            .get_transaction(hash)
            .await?
            .ok_or_else(|| SwapError::TransactionNotFound {
                tx_hash: format!("{:?}", hash),
            })?;

        let Some(block_number) = tx.block_number else {
            return Ok(ChainTransaction {
                hash,
                confirmations: 0,
                status: TxStatus::Pending,
            });
        };

        let current_block = self.provider.get_block_number().await?;
        let confirmations = current_block.saturating_sub(block_number.as_u64()) + 1;

        let status = match self.provider.get_transaction_receipt(hash).await? {
            Some(receipt) if receipt.status == Some(1u64.into()) => TxStatus::Success,
            Some(_) => TxStatus::Failed,
            None => TxStatus::Pending,
        };

        debug!(
            "Transaction {:?} on chain {}: {} confirmations, {:?}",
            hash,
            self.provider.chain_id(),
            confirmations,
            status
        );

        Ok(ChainTransaction {
            hash,
            confirmations,
            status,
        })
    }

    async fn export_private_key(&self) -> SwapResult<PrivateKey> {
        let wallet = self.derive(self.account_index)?;
        Ok(PrivateKey::new(format!(
            "0x{}",
            hex::encode(wallet.signer().to_bytes())
        )))
    }

    async fn get_addresses(&self, start: u32, count: u32) -> SwapResult<Vec<Address>> {
        (start..start.saturating_add(count))
            .map(|index| self.derive(index).map(|w| w.address()))
            .collect()
    }
}

/// Builds wallet clients from configured mnemonics. Keys are re-read for
/// every client and never cached.
pub struct WalletClientFactory {
    network: Network,
    registry: Arc<AssetRegistry>,
    providers: Arc<ProviderCache>,
    wallets: HashMap<String, WalletConfig>,
}

impl WalletClientFactory {
    pub fn new(
        network: Network,
        registry: Arc<AssetRegistry>,
        providers: Arc<ProviderCache>,
        wallets: HashMap<String, WalletConfig>,
    ) -> Self {
        Self {
            network,
            registry,
            providers,
            wallets,
        }
    }
}

impl ClientFactory for WalletClientFactory {
    fn client(
        &self,
        network: Network,
        wallet_id: &str,
        asset: &str,
        account_id: &str,
    ) -> SwapResult<Arc<dyn ChainClient>> {
        if network != self.network {
            return Err(SwapError::Config(format!(
                "Service runs on {}, not {}",
                self.network, network
            )));
        }

        let wallet = self
            .wallets
            .get(wallet_id)
            .ok_or_else(|| SwapError::Wallet(format!("Unknown wallet {}", wallet_id)))?;
        let phrase = std::env::var(&wallet.mnemonic_env).map_err(|_| {
            SwapError::Wallet(format!("Mnemonic variable {} is not set", wallet.mnemonic_env))
        })?;
        let account_index = wallet.accounts.get(account_id).copied().unwrap_or(0);

        let chain_slug = &self.registry.asset(asset)?.chain;
        let chain = self
            .registry
            .chain(chain_slug)
            .ok_or_else(|| SwapError::Config(format!("Chain {} not enabled", chain_slug)))?;
        let provider = self.providers.get(chain.chain_id)?;

        Ok(Arc::new(EvmWalletClient::new(provider, phrase, account_index)))
    }
}
