//! Network, chain and asset descriptors

use crate::config::Settings;
use crate::error::{SwapError, SwapResult};

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chain as the bridge sees it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub slug: String,
    pub chain_id: u64,
    pub is_layer1: bool,
}

/// A wallet asset; `contract_address == None` marks the chain's native asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub symbol: String,
    pub chain: String,
    pub contract_address: Option<Address>,
    pub decimals: u32,
    /// Symbol of the equivalent asset on the layer 1 (e.g. `WETH` for `ETH`)
    pub matching_asset: Option<String>,
}

impl AssetDescriptor {
    pub fn is_native(&self) -> bool {
        self.contract_address.is_none()
    }
}

/// Lookup table for assets and chains known to the wallet
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<String, AssetDescriptor>,
    chains: HashMap<String, ChainDescriptor>,
    native_assets: HashMap<String, String>,
}

impl AssetRegistry {
    pub fn from_settings(settings: &Settings) -> SwapResult<Self> {
        let mut registry = Self::default();

        for (slug, chain) in settings.enabled_chains() {
            registry.add_chain(
                ChainDescriptor {
                    slug: slug.clone(),
                    chain_id: chain.chain_id,
                    is_layer1: chain.is_layer1,
                },
                &chain.native_asset,
            );
        }

        for (symbol, asset) in &settings.assets {
            let contract_address = asset
                .contract_address
                .as_deref()
                .map(|a| {
                    a.parse::<Address>().map_err(|e| {
                        SwapError::Config(format!("Invalid contract address for {}: {}", symbol, e))
                    })
                })
                .transpose()?;

            registry.add_asset(AssetDescriptor {
                symbol: symbol.clone(),
                chain: asset.chain.clone(),
                contract_address,
                decimals: asset.decimals,
                matching_asset: asset.matching_asset.clone(),
            });
        }

        Ok(registry)
    }

    pub fn add_chain(&mut self, chain: ChainDescriptor, native_asset: &str) {
        self.native_assets
            .insert(chain.slug.clone(), native_asset.to_string());
        self.chains.insert(chain.slug.clone(), chain);
    }

    pub fn add_asset(&mut self, asset: AssetDescriptor) {
        self.assets.insert(asset.symbol.clone(), asset);
    }

    pub fn asset(&self, symbol: &str) -> SwapResult<&AssetDescriptor> {
        self.assets
            .get(symbol)
            .ok_or_else(|| SwapError::Config(format!("Unknown asset {}", symbol)))
    }

    pub fn chain(&self, slug: &str) -> Option<&ChainDescriptor> {
        self.chains.get(slug)
    }

    /// Native asset of the chain the given asset lives on
    pub fn native_asset_of(&self, symbol: &str) -> SwapResult<&AssetDescriptor> {
        let chain = &self.asset(symbol)?.chain;
        let native = self
            .native_assets
            .get(chain)
            .ok_or_else(|| SwapError::Config(format!("Chain {} has no native asset", chain)))?;
        self.asset(native)
    }
}
