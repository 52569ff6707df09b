//! Configuration management for the bridge swap service
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::models::Network;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    /// Absent database section runs the service on the in-memory store
    pub database: Option<DatabaseConfig>,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub indexer: IndexerConfig,
    pub bridge: BridgeConfig,
    /// Chains keyed by bridge slug (`ethereum`, `arbitrum`, ...)
    pub chains: HashMap<String, ChainConfig>,
    /// Assets keyed by symbol
    pub assets: HashMap<String, AssetConfig>,
    /// Wallets keyed by wallet id
    #[serde(default)]
    pub wallets: HashMap<String, WalletConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub network: Network,
    pub scan_interval_ms: u64,
    pub health_check_interval_secs: u64,
    pub poll: PollConfig,
}

/// Backoff policy for confirmation polling
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: u32,
    /// Polls per scheduling round; `None` polls until a result or shutdown
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 5_000,
            max_delay_ms: 60_000,
            multiplier: 2,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// Base URL of the subgraph host
    pub url: String,
    /// Dataset name per chain slug
    pub datasets: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Bridge REST API used for send data (rates and fees)
    pub api_url: String,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bridge token symbol -> chain slug -> contract addresses
    pub tokens: HashMap<String, HashMap<String, TokenAddressConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenAddressConfig {
    pub l1_canonical_token: Option<String>,
    pub l2_canonical_token: Option<String>,
    pub l1_bridge: Option<String>,
    pub l2_amm_wrapper: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub is_layer1: bool,
    pub rpc_urls: Vec<String>,
    /// Symbol of the chain's native asset (must be listed in `assets`)
    pub native_asset: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub chain: String,
    /// `None` marks the chain's native asset
    pub contract_address: Option<String>,
    pub decimals: u32,
    pub matching_asset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Environment variable holding the wallet mnemonic
    pub mnemonic_env: String,
    /// Account id -> derivation index
    #[serde(default)]
    pub accounts: HashMap<String, u32>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_slippage_bps() -> u32 {
    50
}

fn default_deadline_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_enabled() -> bool {
    true
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("BRIDGE_SWAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text, substituting environment variables
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        for (slug, chain) in self.enabled_chains() {
            if chain.rpc_urls.is_empty() {
                anyhow::bail!("Chain {} has no RPC URLs configured", slug);
            }
            if !self.assets.contains_key(&chain.native_asset) {
                anyhow::bail!(
                    "Chain {} native asset {} is not configured",
                    slug,
                    chain.native_asset
                );
            }
            if !self.indexer.datasets.contains_key(slug) {
                tracing::warn!("Chain {} has no indexer dataset - transfers cannot be tracked", slug);
            }
        }

        for (symbol, asset) in &self.assets {
            if !self.chains.contains_key(&asset.chain) {
                anyhow::bail!("Asset {} references unknown chain {}", symbol, asset.chain);
            }
        }

        for (token, per_chain) in &self.bridge.tokens {
            for slug in per_chain.keys() {
                if !self.chains.contains_key(slug) {
                    anyhow::bail!("Bridge token {} references unknown chain {}", token, slug);
                }
            }
        }

        if self.service.poll.multiplier == 0 {
            anyhow::bail!("Poll multiplier must be at least 1");
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.values().find(|c| c.chain_id == chain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[service]
network = "mainnet"
scan_interval_ms = 15000
health_check_interval_secs = 30

[service.poll]
initial_delay_ms = 5000
max_delay_ms = 60000
multiplier = 2

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090

[indexer]
url = "https://api.thegraph.com/subgraphs/name/hop-protocol"

[indexer.datasets]
ethereum = "hop-mainnet"
polygon = "hop-polygon"

[bridge]
api_url = "https://api.hop.exchange"

[bridge.tokens.USDC.ethereum]
l1_canonical_token = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
l1_bridge = "0x3666f603Cc164936C1b87e207F36BEBa4AC5f18a"

[bridge.tokens.USDC.polygon]
l2_canonical_token = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"
l2_amm_wrapper = "0x76b22b8C1079A44F1211D867D68b1eda76a635A7"

[chains.ethereum]
chain_id = 1
is_layer1 = true
rpc_urls = ["https://mainnet.example/${TEST_RPC_KEY}"]
native_asset = "ETH"

[chains.polygon]
chain_id = 137
is_layer1 = false
rpc_urls = ["https://polygon.example"]
native_asset = "MATIC"

[assets.ETH]
chain = "ethereum"
decimals = 18

[assets.MATIC]
chain = "polygon"
decimals = 18

[assets.USDC]
chain = "ethereum"
contract_address = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
decimals = 6

[assets.PUSDC]
chain = "polygon"
contract_address = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"
decimals = 6

[wallets.default]
mnemonic_env = "BRIDGE_SWAP_MNEMONIC"
"#;
