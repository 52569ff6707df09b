//! Bridge module - stateless gateway over a per-chain bridge SDK
//!
//! The gateway resolves the bridge token shared by two wallet assets, asks
//! the SDK for rates and fees, and builds approval and send transactions
//! with signers derived from exported wallet keys.

pub mod hop;
pub mod tokens;

pub use hop::HopSdk;

use crate::chain::{ChainProvider, PrivateKey, ProviderCache};
use crate::error::{SwapError, SwapResult};
use crate::models::{to_u256, AssetDescriptor, ChainDescriptor, Quote, RouteQuote};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Signing middleware used for bridge calls
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Canonical and bridge contract addresses of one bridge token on one chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeTokenAddresses {
    pub l1_canonical_token: Option<Address>,
    pub l2_canonical_token: Option<Address>,
    pub l1_bridge: Option<Address>,
    pub l2_amm_wrapper: Option<Address>,
}

/// Rates and fees for one route, in minor units of the bridge token
#[derive(Debug, Clone, PartialEq)]
pub struct SendData {
    pub rate: BigDecimal,
    pub adjusted_bonder_fee: BigDecimal,
    pub adjusted_destination_tx_fee: BigDecimal,
}

/// Fully resolved send call
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    pub bridge_asset: String,
    pub chain_from: ChainDescriptor,
    pub chain_to: ChainDescriptor,
    pub recipient: Address,
    pub amount: U256,
    pub bonder_fee: U256,
    pub amount_out_min: U256,
    pub deadline: U256,
    pub destination_amount_out_min: U256,
    pub destination_deadline: U256,
}

/// Wallet bound to the source chain's provider. Built per signing operation.
#[derive(Clone)]
pub struct SignerContext {
    pub wallet: LocalWallet,
    pub provider: Arc<ChainProvider>,
}

impl SignerContext {
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn client(&self) -> SignerClient {
        SignerMiddleware::new(self.provider.http().clone(), self.wallet.clone())
    }
}

/// Narrow view of the bridge SDK
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeSdk: Send + Sync {
    /// Bridge chain for a slug, `None` when the bridge does not serve it
    fn chain(&self, slug: &str) -> Option<ChainDescriptor>;

    /// Bridge token symbols available on a chain
    fn supported_assets_for_chain(&self, slug: &str) -> Vec<String>;

    /// Bridge token symbol -> chain slug -> addresses
    fn canonical_tokens(&self) -> HashMap<String, HashMap<String, BridgeTokenAddresses>>;

    async fn get_send_data(
        &self,
        bridge_asset: &str,
        amount: &BigDecimal,
        chain_from: &ChainDescriptor,
        chain_to: &ChainDescriptor,
    ) -> SwapResult<Option<SendData>>;

    /// Submit an approval if the bridge needs one; `None` when nothing was sent
    async fn send_approval(
        &self,
        signer: &SignerContext,
        bridge_asset: &str,
        chain_from: &ChainDescriptor,
        chain_to: &ChainDescriptor,
        amount: U256,
    ) -> SwapResult<Option<H256>>;

    async fn send(&self, signer: &SignerContext, request: &SendRequest) -> SwapResult<H256>;
}

/// Stateless facade over the bridge SDK. Owns the provider cache used for
/// signers; the cache lives and dies with the gateway.
pub struct ChainBridgeGateway {
    sdk: Arc<dyn BridgeSdk>,
    providers: Arc<ProviderCache>,
    deadline_secs: u64,
}

impl ChainBridgeGateway {
    pub fn new(sdk: Arc<dyn BridgeSdk>, providers: Arc<ProviderCache>, deadline_secs: u64) -> Self {
        Self {
            sdk,
            providers,
            deadline_secs,
        }
    }

    pub fn providers(&self) -> &Arc<ProviderCache> {
        &self.providers
    }

    pub fn chain(&self, slug: &str) -> Option<ChainDescriptor> {
        self.sdk.chain(slug)
    }

    /// Find the bridge token both assets travel as, `None` for unsupported pairs
    pub fn resolve_bridge_asset(
        &self,
        asset_from: &AssetDescriptor,
        asset_to: &AssetDescriptor,
    ) -> Option<String> {
        let chain_from = self.sdk.chain(&asset_from.chain)?;
        let chain_to = self.sdk.chain(&asset_to.chain)?;

        let tokens = self.sdk.canonical_tokens();
        let mut from_family = None;
        let mut to_family = None;
        for (symbol, per_chain) in &tokens {
            if from_family.is_none() {
                from_family = find_asset(asset_from, &chain_from, per_chain, symbol);
            }
            if to_family.is_none() {
                to_family = find_asset(asset_to, &chain_to, per_chain, symbol);
            }
        }

        let bridge_asset = match (from_family, to_family) {
            (Some(from), Some(to)) if from == to => from,
            _ => return None,
        };

        let supported_from = self.sdk.supported_assets_for_chain(&chain_from.slug);
        let supported_to = self.sdk.supported_assets_for_chain(&chain_to.slug);
        if !supported_from.contains(&bridge_asset) || !supported_to.contains(&bridge_asset) {
            debug!(
                "Bridge asset {} not served on {} -> {}",
                bridge_asset, chain_from.slug, chain_to.slug
            );
            return None;
        }

        Some(bridge_asset)
    }

    /// Current rate and fees for a route, `None` when there is no route
    pub async fn get_quote(
        &self,
        bridge_asset: &str,
        chain_from: &ChainDescriptor,
        chain_to: &ChainDescriptor,
        amount: &BigDecimal,
    ) -> Option<RouteQuote> {
        if amount <= &BigDecimal::from(0) {
            return None;
        }

        let send_data = match self
            .sdk
            .get_send_data(bridge_asset, amount, chain_from, chain_to)
            .await
        {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    "Send data unavailable for {} {} -> {}: {}",
                    bridge_asset, chain_from.slug, chain_to.slug, e
                );
                return None;
            }
        };

        if send_data.rate <= BigDecimal::from(0) {
            warn!("Bridge returned non-positive rate for {}", bridge_asset);
            return None;
        }

        Some(RouteQuote {
            rate: send_data.rate,
            bonder_fee: send_data.adjusted_bonder_fee,
            destination_fee: send_data.adjusted_destination_tx_fee,
        })
    }

    /// Derive a signer for the source chain from an exported key
    pub fn signer(&self, key: &PrivateKey, chain: &ChainDescriptor) -> SwapResult<SignerContext> {
        let wallet = key
            .expose()
            .parse::<LocalWallet>()
            .map_err(|e| SwapError::Wallet(format!("Invalid private key: {}", e)))?
            .with_chain_id(chain.chain_id);
        let provider = self.providers.get(chain.chain_id)?;
        Ok(SignerContext { wallet, provider })
    }

    pub async fn build_approval_transaction(
        &self,
        signer: &SignerContext,
        bridge_asset: &str,
        chain_from: &ChainDescriptor,
        chain_to: &ChainDescriptor,
        amount: &BigDecimal,
    ) -> SwapResult<Option<H256>> {
        let amount = to_u256(amount)?;
        let tx_hash = self
            .sdk
            .send_approval(signer, bridge_asset, chain_from, chain_to, amount)
            .await?;

        match tx_hash {
            Some(hash) => info!("Approval {:?} submitted on {}", hash, chain_from.slug),
            None => debug!("No approval needed for {} on {}", bridge_asset, chain_from.slug),
        }
        Ok(tx_hash)
    }

    /// Submit the bridge send for a quote. Fees come from the quote and are
    /// never re-fetched.
    pub async fn build_send_transaction(
        &self,
        signer: &SignerContext,
        quote: &Quote,
        slippage_bps: u32,
    ) -> SwapResult<H256> {
        let request = self.send_request(signer.address(), quote, slippage_bps)?;
        let tx_hash = self.sdk.send(signer, &request).await?;
        info!(
            "Send {:?} submitted: {} {} -> {}",
            tx_hash, quote.bridge_asset, quote.chain_from.slug, quote.chain_to.slug
        );
        Ok(tx_hash)
    }

    fn send_request(
        &self,
        recipient: Address,
        quote: &Quote,
        slippage_bps: u32,
    ) -> SwapResult<SendRequest> {
        let amount_out_min = min_amount_out(&quote.to_amount, slippage_bps);
        let deadline = U256::from(chrono::Utc::now().timestamp() as u64 + self.deadline_secs);
        let to_layer1 = quote.chain_to.is_layer1;

        Ok(SendRequest {
            bridge_asset: quote.bridge_asset.clone(),
            chain_from: quote.chain_from.clone(),
            chain_to: quote.chain_to.clone(),
            recipient,
            amount: to_u256(&quote.from_amount)?,
            bonder_fee: to_u256(&quote.total_fee().with_scale(0))?,
            amount_out_min: to_u256(&amount_out_min)?,
            deadline,
            destination_amount_out_min: if to_layer1 {
                U256::zero()
            } else {
                to_u256(&amount_out_min)?
            },
            destination_deadline: if to_layer1 { U256::zero() } else { deadline },
        })
    }
}

/// Quoted amount minus slippage, truncated to whole units
fn min_amount_out(to_amount: &BigDecimal, slippage_bps: u32) -> BigDecimal {
    let kept = BigDecimal::from(10_000u32.saturating_sub(slippage_bps));
    (to_amount * kept / BigDecimal::from(10_000u32)).with_scale(0)
}

fn find_asset(
    asset: &AssetDescriptor,
    chain: &ChainDescriptor,
    per_chain: &HashMap<String, BridgeTokenAddresses>,
    symbol: &str,
) -> Option<String> {
    match asset.contract_address {
        None => {
            let codes = std::iter::once(asset.symbol.as_str())
                .chain(asset.matching_asset.as_deref());
            (tokens::canonical_family(codes) == Some(symbol)).then(|| symbol.to_string())
        }
        Some(contract) => {
            let addresses = per_chain.get(&chain.slug)?;
            let canonical = if chain.is_layer1 {
                addresses.l1_canonical_token
            } else {
                addresses.l2_canonical_token
            };
            (canonical == Some(contract)).then(|| symbol.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC_L1: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const USDC_POLYGON: &str = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174";

    fn chain(slug: &str) -> Option<ChainDescriptor> {
        match slug {
            "ethereum" => Some(ChainDescriptor { slug: slug.into(), chain_id: 1, is_layer1: true }),
            "polygon" => Some(ChainDescriptor { slug: slug.into(), chain_id: 137, is_layer1: false }),
            "arbitrum" => Some(ChainDescriptor { slug: slug.into(), chain_id: 42161, is_layer1: false }),
            _ => None,
        }
    }

    fn asset(symbol: &str, chain: &str, contract: Option<&str>) -> AssetDescriptor {
        AssetDescriptor {
            symbol: symbol.to_string(),
            chain: chain.to_string(),
            contract_address: contract.map(|c| c.parse().unwrap()),
            decimals: 6,
            matching_asset: None,
        }
    }

    fn mock_sdk() -> MockBridgeSdk {
        let mut sdk = MockBridgeSdk::new();
        sdk.expect_chain().returning(|slug| chain(slug));
        sdk.expect_supported_assets_for_chain().returning(|slug| match slug {
            "ethereum" => vec!["USDC".into(), "ETH".into(), "MATIC".into()],
            "polygon" => vec!["USDC".into(), "ETH".into(), "MATIC".into()],
            "arbitrum" => vec!["USDC".into(), "ETH".into()],
            _ => vec![],
        });
        sdk.expect_canonical_tokens().returning(|| {
            let mut usdc = HashMap::new();
            usdc.insert(
                "ethereum".to_string(),
                BridgeTokenAddresses {
                    l1_canonical_token: Some(USDC_L1.parse().unwrap()),
                    ..Default::default()
                },
            );
            usdc.insert(
                "polygon".to_string(),
                BridgeTokenAddresses {
                    l2_canonical_token: Some(USDC_POLYGON.parse().unwrap()),
                    ..Default::default()
                },
            );
            let mut tokens = HashMap::new();
            tokens.insert("USDC".to_string(), usdc);
            tokens.insert("ETH".to_string(), HashMap::new());
            tokens.insert("MATIC".to_string(), HashMap::new());
            tokens
        });
        sdk
    }

    fn gateway(sdk: MockBridgeSdk) -> ChainBridgeGateway {
        ChainBridgeGateway::new(
            Arc::new(sdk),
            Arc::new(ProviderCache::new(HashMap::new())),
            7 * 24 * 3600,
        )
    }

    #[test]
    fn test_resolves_token_pair_by_canonical_address() {
        let gateway = gateway(mock_sdk());
        let from = asset("USDC", "ethereum", Some(USDC_L1));
        let to = asset("PUSDC", "polygon", Some(USDC_POLYGON));
        assert_eq!(gateway.resolve_bridge_asset(&from, &to), Some("USDC".to_string()));
    }

    #[test]
    fn test_resolves_native_pair_by_family() {
        let gateway = gateway(mock_sdk());
        let from = asset("ETH", "ethereum", None);
        let mut to = asset("ARBETH", "arbitrum", None);
        to.matching_asset = Some("ETH".to_string());
        assert_eq!(gateway.resolve_bridge_asset(&from, &to), Some("ETH".to_string()));
    }

    #[test]
    fn test_resolution_requires_same_family() {
        let gateway = gateway(mock_sdk());
        let assets = vec![
            asset("USDC", "ethereum", Some(USDC_L1)),
            asset("PUSDC", "polygon", Some(USDC_POLYGON)),
            asset("ETH", "ethereum", None),
            asset("MATIC", "polygon", None),
            asset("DOGE", "polygon", Some("0x0000000000000000000000000000000000000001")),
        ];
        let family = |a: &AssetDescriptor| match a.symbol.as_str() {
            "USDC" | "PUSDC" => Some("USDC"),
            "ETH" => Some("ETH"),
            "MATIC" => Some("MATIC"),
            _ => None,
        };

        for from in &assets {
            for to in &assets {
                let resolved = gateway.resolve_bridge_asset(from, to);
                let same_family = family(from).is_some() && family(from) == family(to);
                assert_eq!(resolved.is_some(), same_family, "{} -> {}", from.symbol, to.symbol);
            }
        }
    }

    #[test]
    fn test_unsupported_chain_or_asset() {
        let gateway = gateway(mock_sdk());
        let from = asset("USDC", "ethereum", Some(USDC_L1));
        let to = asset("USDC", "fantom", Some(USDC_L1));
        assert_eq!(gateway.resolve_bridge_asset(&from, &to), None);

        // MATIC is not served on arbitrum
        let from = asset("MATIC", "polygon", None);
        let mut to = asset("AMATIC", "arbitrum", None);
        to.matching_asset = Some("WMATIC".to_string());
        assert_eq!(gateway.resolve_bridge_asset(&from, &to), None);
    }

    #[tokio::test]
    async fn test_get_quote_rejects_non_positive_amount_without_calling_sdk() {
        let mut sdk = mock_sdk();
        sdk.expect_get_send_data().times(0);
        let gateway = gateway(sdk);
        let l1 = chain("ethereum").unwrap();
        let l2 = chain("polygon").unwrap();

        assert!(gateway.get_quote("USDC", &l1, &l2, &BigDecimal::from(0)).await.is_none());
        assert!(gateway.get_quote("USDC", &l1, &l2, &BigDecimal::from(-5)).await.is_none());
    }

    #[tokio::test]
    async fn test_get_quote_maps_send_data() {
        let mut sdk = mock_sdk();
        sdk.expect_get_send_data()
            .withf(|asset, amount, from, to| {
                asset.to_string() == "USDC"
                    && amount.to_string() == "100"
                    && from.slug == "ethereum"
                    && to.slug == "polygon"
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Some(SendData {
                    rate: "0.98".parse().unwrap(),
                    adjusted_bonder_fee: BigDecimal::from(1),
                    adjusted_destination_tx_fee: "0.5".parse().unwrap(),
                }))
            });
        let gateway = gateway(sdk);

        let quote = gateway
            .get_quote("USDC", &chain("ethereum").unwrap(), &chain("polygon").unwrap(), &BigDecimal::from(100))
            .await
            .unwrap();
        assert_eq!(quote.rate, "0.98".parse::<BigDecimal>().unwrap());
        assert_eq!(quote.bonder_fee, BigDecimal::from(1));
    }

    #[tokio::test]
    async fn test_get_quote_swallows_sdk_failures() {
        let mut sdk = mock_sdk();
        sdk.expect_get_send_data()
            .times(1)
            .returning(|_, _, _, _| Err(SwapError::Bridge("liquidity endpoint down".into())));
        let gateway = gateway(sdk);
        let quote = gateway
            .get_quote("USDC", &chain("ethereum").unwrap(), &chain("polygon").unwrap(), &BigDecimal::from(100))
            .await;
        assert!(quote.is_none());
    }

    #[test]
    fn test_send_request_applies_slippage_and_deadlines() {
        let gateway = gateway(mock_sdk());
        let swap = crate::models::sample_swap(false);
        let recipient = Address::repeat_byte(0x42);

        let request = gateway.send_request(recipient, &swap.quote(), 50).unwrap();
        assert_eq!(request.amount, U256::from(100));
        // 98 * 0.995 = 97.51, truncated
        assert_eq!(request.amount_out_min, U256::from(97));
        assert_eq!(request.bonder_fee, U256::from(1));
        // destination is layer 1
        assert_eq!(request.destination_deadline, U256::zero());
        assert_eq!(request.destination_amount_out_min, U256::zero());
        assert!(request.deadline > U256::zero());
    }
}
