//! Hop bridge SDK: REST send data plus direct contract calls

use super::{tokens, BridgeSdk, BridgeTokenAddresses, SendData, SendRequest, SignerContext};
use crate::config::{BridgeConfig, Settings};
use crate::error::{SwapError, SwapResult};
use crate::models::ChainDescriptor;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

abigen!(
    Erc20,
    r#"[
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
    ]"#;

    L1Bridge,
    r#"[
        function sendToL2(uint256 chainId, address recipient, uint256 amount, uint256 amountOutMin, uint256 deadline, address relayer, uint256 relayerFee) external payable
    ]"#;

    L2AmmWrapper,
    r#"[
        function swapAndSend(uint256 chainId, address recipient, uint256 amount, uint256 bonderFee, uint256 amountOutMin, uint256 deadline, uint256 destinationAmountOutMin, uint256 destinationDeadline) external payable
    ]"#;
);

/// `/v1/quote` response; amounts are integer strings in token units
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    amount_in: String,
    bonder_fee: String,
    #[serde(alias = "estimatedRecieved")]
    estimated_received: String,
    #[serde(default)]
    destination_tx_fee: Option<String>,
}

impl QuoteResponse {
    fn into_send_data(self) -> Option<SendData> {
        let amount_in = BigDecimal::from_str(&self.amount_in).ok()?;
        let bonder_fee = BigDecimal::from_str(&self.bonder_fee).ok()?;
        let received = BigDecimal::from_str(&self.estimated_received).ok()?;
        let destination_fee = match self.destination_tx_fee {
            Some(fee) => BigDecimal::from_str(&fee).ok()?,
            None => BigDecimal::from(0),
        };
        if amount_in <= BigDecimal::from(0) {
            return None;
        }

        let rate = (received + &bonder_fee + &destination_fee) / amount_in;
        Some(SendData {
            rate,
            adjusted_bonder_fee: bonder_fee,
            adjusted_destination_tx_fee: destination_fee,
        })
    }
}

/// Bridge SDK backed by the Hop REST API and its bridge contracts
pub struct HopSdk {
    api_url: String,
    client: reqwest::Client,
    slippage_bps: u32,
    chains: HashMap<String, ChainDescriptor>,
    tokens: HashMap<String, HashMap<String, BridgeTokenAddresses>>,
}

impl HopSdk {
    pub fn from_settings(settings: &Settings) -> SwapResult<Self> {
        let chains = settings
            .enabled_chains()
            .into_iter()
            .filter(|(slug, _)| tokens::is_bridge_chain(slug))
            .map(|(slug, chain)| {
                (
                    slug.clone(),
                    ChainDescriptor {
                        slug: slug.clone(),
                        chain_id: chain.chain_id,
                        is_layer1: chain.is_layer1,
                    },
                )
            })
            .collect();

        Self::new(&settings.bridge, chains)
    }

    pub fn new(config: &BridgeConfig, chains: HashMap<String, ChainDescriptor>) -> SwapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let mut tokens = HashMap::new();
        for (symbol, per_chain) in &config.tokens {
            let mut addresses = HashMap::new();
            for (slug, raw) in per_chain {
                addresses.insert(
                    slug.clone(),
                    BridgeTokenAddresses {
                        l1_canonical_token: parse_address(&raw.l1_canonical_token)?,
                        l2_canonical_token: parse_address(&raw.l2_canonical_token)?,
                        l1_bridge: parse_address(&raw.l1_bridge)?,
                        l2_amm_wrapper: parse_address(&raw.l2_amm_wrapper)?,
                    },
                );
            }
            tokens.insert(symbol.clone(), addresses);
        }

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            slippage_bps: config.slippage_bps,
            chains,
            tokens,
        })
    }

    fn addresses(&self, bridge_asset: &str, chain: &ChainDescriptor) -> SwapResult<&BridgeTokenAddresses> {
        self.tokens
            .get(bridge_asset)
            .and_then(|per_chain| per_chain.get(&chain.slug))
            .ok_or_else(|| {
                SwapError::Bridge(format!("{} is not deployed on {}", bridge_asset, chain.slug))
            })
    }

    /// Token contract and bridge spender on the source chain. A missing
    /// token contract means the asset is native.
    fn source_contracts(
        &self,
        bridge_asset: &str,
        chain: &ChainDescriptor,
    ) -> SwapResult<(Option<Address>, Address)> {
        let addresses = self.addresses(bridge_asset, chain)?;
        let (token, spender) = if chain.is_layer1 {
            (addresses.l1_canonical_token, addresses.l1_bridge)
        } else {
            (addresses.l2_canonical_token, addresses.l2_amm_wrapper)
        };
        let spender = spender.ok_or_else(|| {
            SwapError::Bridge(format!("No bridge contract for {} on {}", bridge_asset, chain.slug))
        })?;
        Ok((token, spender))
    }
}

fn parse_address(raw: &Option<String>) -> SwapResult<Option<Address>> {
    raw.as_deref()
        .map(|a| {
            a.parse::<Address>()
                .map_err(|e| SwapError::Config(format!("Invalid bridge address {}: {}", a, e)))
        })
        .transpose()
}

#[async_trait]
impl BridgeSdk for HopSdk {
    fn chain(&self, slug: &str) -> Option<ChainDescriptor> {
        self.chains.get(slug).cloned()
    }

    fn supported_assets_for_chain(&self, slug: &str) -> Vec<String> {
        if !self.chains.contains_key(slug) {
            return Vec::new();
        }
        let mut assets: Vec<String> = self
            .tokens
            .iter()
            .filter(|(_, per_chain)| per_chain.contains_key(slug))
            .map(|(symbol, _)| symbol.clone())
            .collect();
        assets.sort();
        assets
    }

    fn canonical_tokens(&self) -> HashMap<String, HashMap<String, BridgeTokenAddresses>> {
        self.tokens.clone()
    }

    async fn get_send_data(
        &self,
        bridge_asset: &str,
        amount: &BigDecimal,
        chain_from: &ChainDescriptor,
        chain_to: &ChainDescriptor,
    ) -> SwapResult<Option<SendData>> {
        let slippage = BigDecimal::from(self.slippage_bps) / BigDecimal::from(100);
        let url = format!("{}/v1/quote", self.api_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("amount", amount.with_scale(0).to_string()),
                ("token", bridge_asset.to_string()),
                ("fromChain", chain_from.slug.clone()),
                ("toChain", chain_to.slug.clone()),
                ("slippage", slippage.normalized().to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(
                "Quote for {} {} -> {} rejected with {}",
                bridge_asset,
                chain_from.slug,
                chain_to.slug,
                response.status()
            );
            return Ok(None);
        }

        match response.json::<QuoteResponse>().await {
            Ok(quote) => Ok(quote.into_send_data()),
            Err(e) => {
                warn!("Malformed quote response for {}: {}", bridge_asset, e);
                Ok(None)
            }
        }
    }

    async fn send_approval(
        &self,
        signer: &SignerContext,
        bridge_asset: &str,
        chain_from: &ChainDescriptor,
        _chain_to: &ChainDescriptor,
        amount: U256,
    ) -> SwapResult<Option<H256>> {
        let (token, spender) = self.source_contracts(bridge_asset, chain_from)?;
        let Some(token) = token else {
            return Ok(None);
        };

        let erc20 = Erc20::new(token, Arc::new(signer.client()));
        let allowance = erc20
            .allowance(signer.address(), spender)
            .call()
            .await
            .map_err(|e| SwapError::Bridge(format!("Allowance check failed: {}", e)))?;
        if allowance >= amount {
            return Ok(None);
        }

        let call = erc20.approve(spender, amount);
        let pending = call
            .send()
            .await
            .map_err(|e| SwapError::Bridge(format!("Approval failed: {}", e)))?;
        Ok(Some(pending.tx_hash()))
    }

    async fn send(&self, signer: &SignerContext, request: &SendRequest) -> SwapResult<H256> {
        let (token, spender) = self.source_contracts(&request.bridge_asset, &request.chain_from)?;
        let client = Arc::new(signer.client());
        let destination = U256::from(request.chain_to.chain_id);

        let call = if request.chain_from.is_layer1 {
            L1Bridge::new(spender, client).send_to_l2(
                destination,
                request.recipient,
                request.amount,
                request.amount_out_min,
                request.deadline,
                Address::zero(),
                U256::zero(),
            )
        } else {
            L2AmmWrapper::new(spender, client).swap_and_send(
                destination,
                request.recipient,
                request.amount,
                request.bonder_fee,
                request.amount_out_min,
                request.deadline,
                request.destination_amount_out_min,
                request.destination_deadline,
            )
        };
        let call = if token.is_none() {
            call.value(request.amount)
        } else {
            call
        };

        let pending = call
            .send()
            .await
            .map_err(|e| SwapError::Bridge(format!("Send failed: {}", e)))?;
        Ok(pending.tx_hash())
    }
}
