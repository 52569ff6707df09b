//! Bridge swap provider built on the chain bridge gateway

use super::{BalanceUpdater, SwapProvider};
use crate::bridge::{ChainBridgeGateway, SignerContext};
use crate::chain::{ChainClient, ChainTransaction, ClientFactory, TxStatus};
use crate::error::{SwapError, SwapResult};
use crate::indexer::{DestinationLookup, TransferIndex};
use crate::models::{
    currency_to_unit, unit_to_currency, AssetRegistry, FeeTier, Network, Quote, QuoteRequest,
    Swap, SwapStatus, SwapUpdate, TxType,
};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::types::H256;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PROVIDER_ID: &str = "hop";

pub struct HopSwapProvider {
    gateway: Arc<ChainBridgeGateway>,
    index: Arc<dyn TransferIndex>,
    clients: Arc<dyn ClientFactory>,
    registry: Arc<AssetRegistry>,
    balances: Arc<dyn BalanceUpdater>,
    slippage_bps: u32,
}

impl HopSwapProvider {
    pub fn new(
        gateway: Arc<ChainBridgeGateway>,
        index: Arc<dyn TransferIndex>,
        clients: Arc<dyn ClientFactory>,
        registry: Arc<AssetRegistry>,
        balances: Arc<dyn BalanceUpdater>,
        slippage_bps: u32,
    ) -> Self {
        Self {
            gateway,
            index,
            clients,
            registry,
            balances,
            slippage_bps,
        }
    }

    fn source_client(&self, swap: &Swap) -> SwapResult<Arc<dyn ChainClient>> {
        self.clients
            .client(swap.network, &swap.wallet_id, &swap.from, &swap.from_account_id)
    }

    /// Fresh signer for the source chain; the key is exported per call
    async fn signer(&self, swap: &Swap) -> SwapResult<SignerContext> {
        let key = self.source_client(swap)?.export_private_key().await?;
        self.gateway.signer(&key, &swap.chain_from)
    }

    /// Transaction with at least one confirmation. Hashes the chain does not
    /// know yet count as unconfirmed.
    async fn confirmed(
        &self,
        client: &dyn ChainClient,
        hash: H256,
    ) -> SwapResult<Option<ChainTransaction>> {
        match client.get_transaction_by_hash(hash).await {
            Ok(tx) if tx.confirmations > 0 => Ok(Some(tx)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => {
                warn!("{}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn approve(&self, swap: &Swap) -> SwapResult<SwapUpdate> {
        let signer = self.signer(swap).await?;
        let approve_tx = self
            .gateway
            .build_approval_transaction(
                &signer,
                &swap.bridge_asset,
                &swap.chain_from,
                &swap.chain_to,
                &swap.from_amount,
            )
            .await?;

        Ok(SwapUpdate::status(SwapStatus::ApprovalPending).with_approve_tx(approve_tx))
    }

    async fn wait_for_approval(&self, swap: &Swap) -> SwapResult<Option<SwapUpdate>> {
        // no approval was needed
        let Some(hash) = swap.approve_tx_hash else {
            return Ok(Some(SwapUpdate::status(SwapStatus::ApprovalConfirmed)));
        };

        let client = self.source_client(swap)?;
        Ok(self
            .confirmed(client.as_ref(), hash)
            .await?
            .map(|_| SwapUpdate::status(SwapStatus::ApprovalConfirmed)))
    }

    async fn send(&self, swap: &Swap) -> SwapResult<SwapUpdate> {
        let signer = self.signer(swap).await?;
        let swap_tx = self
            .gateway
            .build_send_transaction(&signer, &swap.quote(), swap.slippage_bps)
            .await?;
        crate::metrics::record_send_submitted(&swap.chain_from.slug);

        Ok(SwapUpdate::status(SwapStatus::SendPending).with_swap_tx(swap_tx))
    }

    async fn wait_for_send(&self, swap: &Swap) -> SwapResult<Option<SwapUpdate>> {
        let hash = send_hash(swap)?;
        let client = self.source_client(swap)?;
        let Some(tx) = self.confirmed(client.as_ref(), hash).await? else {
            return Ok(None);
        };
        if tx.status == TxStatus::Pending {
            return Ok(None);
        }

        self.balances
            .update_balances(swap.network, &swap.wallet_id, &[swap.from.clone()])
            .await;

        Ok(Some(match tx.status {
            TxStatus::Success => SwapUpdate::status(SwapStatus::DestinationPending),
            _ => {
                warn!("Send {:?} of swap {} reverted", hash, swap.id);
                SwapUpdate::status(SwapStatus::Failed).ended()
            }
        }))
    }

    async fn wait_for_destination(&self, swap: &Swap) -> SwapResult<Option<SwapUpdate>> {
        let hash = send_hash(swap)?;

        let lookup = if DestinationLookup::crosses_from_layer1(&swap.chain_from, &swap.chain_to) {
            DestinationLookup::ByRecipient {
                recipient: self.signer(swap).await?.address(),
                since: swap.created_at.timestamp(),
            }
        } else {
            match self.index.find_transfer_id(&swap.chain_from, hash).await? {
                Some(transfer_id) => DestinationLookup::ByTransferId(transfer_id),
                None => {
                    debug!("Transfer for swap {} not indexed yet", swap.id);
                    return Ok(None);
                }
            }
        };

        let Some(receive_tx) = self
            .index
            .find_destination_tx_hash(&swap.chain_to, &lookup)
            .await?
        else {
            debug!("Destination of swap {} not indexed yet", swap.id);
            return Ok(None);
        };

        let client = self
            .clients
            .client(swap.network, &swap.wallet_id, &swap.to, &swap.from_account_id)?;
        let Some(tx) = self.confirmed(client.as_ref(), receive_tx).await? else {
            return Ok(None);
        };

        let status = match tx.status {
            TxStatus::Pending => return Ok(None),
            TxStatus::Success => SwapStatus::Success,
            TxStatus::Failed => SwapStatus::Failed,
        };
        Ok(Some(
            SwapUpdate::status(status)
                .with_receive_tx(receive_tx)
                .ended(),
        ))
    }
}

fn send_hash(swap: &Swap) -> SwapResult<H256> {
    swap.swap_tx_hash
        .ok_or_else(|| SwapError::Internal(format!("Swap {} has no send transaction", swap.id)))
}

#[async_trait]
impl SwapProvider for HopSwapProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn get_supported_pairs(&self) -> SwapResult<Vec<(String, String)>> {
        Ok(Vec::new())
    }

    async fn get_quote(&self, request: &QuoteRequest) -> SwapResult<Option<Quote>> {
        if request.amount <= BigDecimal::from(0) {
            return Ok(None);
        }

        let (Ok(from), Ok(to)) = (
            self.registry.asset(&request.from),
            self.registry.asset(&request.to),
        ) else {
            debug!("Unknown asset in {} -> {}", request.from, request.to);
            return Ok(None);
        };

        let Some(bridge_asset) = self.gateway.resolve_bridge_asset(from, to) else {
            crate::metrics::record_quote("unsupported");
            return Ok(None);
        };
        let (Some(chain_from), Some(chain_to)) =
            (self.gateway.chain(&from.chain), self.gateway.chain(&to.chain))
        else {
            crate::metrics::record_quote("unsupported");
            return Ok(None);
        };

        let from_amount = currency_to_unit(from.decimals, &request.amount);
        let Some(route) = self
            .gateway
            .get_quote(&bridge_asset, &chain_from, &chain_to, &from_amount)
            .await
        else {
            crate::metrics::record_quote("no_route");
            return Ok(None);
        };

        let to_amount = (&from_amount * &route.rate).with_scale(0);
        crate::metrics::record_quote("ok");

        Ok(Some(Quote {
            from: request.from.clone(),
            to: request.to.clone(),
            from_amount,
            to_amount,
            bonder_fee: route.bonder_fee,
            destination_fee: route.destination_fee,
            bridge_asset,
            chain_from,
            chain_to,
        }))
    }

    async fn new_swap(
        &self,
        network: Network,
        wallet_id: &str,
        from_account_id: &str,
        quote: &Quote,
    ) -> SwapResult<Swap> {
        let mut swap = Swap::from_quote(
            PROVIDER_ID,
            network,
            wallet_id,
            from_account_id,
            quote,
            self.slippage_bps,
        );
        let update = self.approve(&swap).await?;
        swap.apply(&update)?;

        info!(
            "Swap {} created: {} {} -> {} via {}",
            swap.id, swap.from_amount, swap.from, swap.to, swap.bridge_asset
        );
        Ok(swap)
    }

    async fn perform_next_action(&self, swap: &Swap) -> SwapResult<Option<SwapUpdate>> {
        match swap.status {
            SwapStatus::Quoted => self.approve(swap).await.map(Some),
            SwapStatus::ApprovalPending => self.wait_for_approval(swap).await,
            SwapStatus::ApprovalConfirmed => self.send(swap).await.map(Some),
            SwapStatus::SendPending => self.wait_for_send(swap).await,
            SwapStatus::DestinationPending => self.wait_for_destination(swap).await,
            SwapStatus::Success | SwapStatus::Failed => Ok(None),
        }
    }

    async fn estimate_fees(
        &self,
        tx_type: TxType,
        quote: &Quote,
        tiers: &[FeeTier],
    ) -> SwapResult<Option<BTreeMap<FeeTier, BigDecimal>>> {
        match tx_type {
            TxType::Swap => {}
        }

        let native = self.registry.native_asset_of(&quote.from)?;
        let fee = unit_to_currency(native.decimals, &quote.total_fee());

        // the bridge has no fee tiers
        Ok(Some(tiers.iter().map(|tier| (*tier, fee.clone())).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::indexer::MockTransferIndex;
    use crate::swap::testing::{self, Harness};
    use mockall::Sequence;

    fn request(from: &str, to: &str, amount: &str) -> QuoteRequest {
        QuoteRequest {
            network: Network::Mainnet,
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_quote_applies_rate_and_keeps_fees() {
        let harness = Harness::new();
        // 0.0001 USDC is 100 minor units
        let quote = harness
            .provider
            .get_quote(&request("USDC", "PUSDC", "0.0001"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(quote.from_amount, BigDecimal::from(100));
        assert_eq!(quote.to_amount, BigDecimal::from(98));
        assert_eq!(quote.total_fee(), "1.5".parse::<BigDecimal>().unwrap());
        assert_eq!(quote.bridge_asset, "USDC");
        assert!(quote.chain_from.is_layer1);
    }

    #[tokio::test]
    async fn test_quote_unsupported_pairs() {
        let harness = Harness::new();
        let provider = &harness.provider;
        assert!(provider.get_quote(&request("USDC", "MATIC", "1")).await.unwrap().is_none());
        assert!(provider.get_quote(&request("USDC", "DOGE", "1")).await.unwrap().is_none());
        assert!(provider.get_quote(&request("USDC", "PUSDC", "0")).await.unwrap().is_none());
        assert!(provider.get_supported_pairs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fees_identical_across_tiers_in_native_units() {
        let harness = Harness::new();
        let quote = testing::sample_swap(true).quote();
        let fees = harness
            .provider
            .estimate_fees(TxType::Swap, &quote, &FeeTier::ALL)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fees.len(), 3);
        // 1.5 wei of ETH
        let expected: BigDecimal = "0.0000000000000000015".parse().unwrap();
        assert!(fees.values().all(|fee| *fee == expected));
    }

    #[tokio::test]
    async fn test_new_swap_submits_approval() {
        let harness = Harness::new();
        let quote = testing::sample_swap(true).quote();
        let swap = harness
            .provider
            .new_swap(Network::Mainnet, "default", "acc-0", &quote)
            .await
            .unwrap();

        assert_eq!(swap.status, SwapStatus::ApprovalPending);
        assert_eq!(swap.approve_tx_hash, Some(testing::APPROVE_HASH));
        assert_eq!(swap.slippage_bps, 50);
        assert_eq!(harness.sdk.approvals(), 1);
    }

    #[tokio::test]
    async fn test_skipped_approval_confirms_without_polling() {
        let harness = Harness::builder().needs_approval(false).build();
        let quote = testing::sample_swap(true).quote();
        let swap = harness
            .provider
            .new_swap(Network::Mainnet, "default", "acc-0", &quote)
            .await
            .unwrap();
        assert_eq!(swap.approve_tx_hash, None);

        let update = harness.provider.perform_next_action(&swap).await.unwrap();
        assert_eq!(update.unwrap().status, SwapStatus::ApprovalConfirmed);
    }

    #[tokio::test]
    async fn test_unknown_approval_hash_is_not_yet_confirmed() {
        let harness = Harness::builder().auto_mine(false).build();
        let mut swap = testing::sample_swap(true);
        swap.apply(&SwapUpdate::status(SwapStatus::ApprovalPending).with_approve_tx(Some(testing::APPROVE_HASH)))
            .unwrap();

        assert!(harness.provider.perform_next_action(&swap).await.unwrap().is_none());

        harness.ledger.mine(testing::APPROVE_HASH, 0, TxStatus::Pending);
        assert!(harness.provider.perform_next_action(&swap).await.unwrap().is_none());

        harness.ledger.mine(testing::APPROVE_HASH, 1, TxStatus::Success);
        let update = harness.provider.perform_next_action(&swap).await.unwrap();
        assert_eq!(update.unwrap().status, SwapStatus::ApprovalConfirmed);
    }

    #[tokio::test]
    async fn test_confirmed_waits_for_known_mined_transaction() {
        let harness = Harness::new();
        let hash = testing::APPROVE_HASH;

        let mut seq = Sequence::new();
        let mut client = MockChainClient::new();
        client
            .expect_get_transaction_by_hash()
            .withf(move |requested| *requested == hash)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|hash| {
                Err(SwapError::TransactionNotFound {
                    tx_hash: format!("{:?}", hash),
                })
            });
        client
            .expect_get_transaction_by_hash()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|hash| {
                Ok(ChainTransaction {
                    hash,
                    confirmations: 0,
                    status: TxStatus::Pending,
                })
            });
        client
            .expect_get_transaction_by_hash()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|hash| {
                Ok(ChainTransaction {
                    hash,
                    confirmations: 2,
                    status: TxStatus::Success,
                })
            });
        client
            .expect_get_transaction_by_hash()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SwapError::ChainClient("rate limited".to_string())));

        let provider = &harness.provider;
        assert!(provider.confirmed(&client, hash).await.unwrap().is_none());
        assert!(provider.confirmed(&client, hash).await.unwrap().is_none());

        let tx = provider.confirmed(&client, hash).await.unwrap().unwrap();
        assert_eq!(tx.confirmations, 2);
        assert_eq!(tx.status, TxStatus::Success);

        let err = provider.confirmed(&client, hash).await.unwrap_err();
        assert!(matches!(err, SwapError::ChainClient(_)));
    }

    #[tokio::test]
    async fn test_fatal_chain_error_propagates() {
        let harness = Harness::builder().chain_failure("connection refused").build();
        let mut swap = testing::sample_swap(true);
        swap.apply(&SwapUpdate::status(SwapStatus::ApprovalPending).with_approve_tx(Some(testing::APPROVE_HASH)))
            .unwrap();

        let err = harness.provider.perform_next_action(&swap).await.unwrap_err();
        assert!(matches!(err, SwapError::ChainClient(_)));
    }

    #[tokio::test]
    async fn test_reverted_send_fails_swap_and_refreshes_balance() {
        let harness = Harness::builder().send_status(TxStatus::Failed).build();
        let mut swap = testing::sample_swap(true);
        swap.status = SwapStatus::SendPending;
        swap.swap_tx_hash = Some(testing::SEND_HASH);
        harness.ledger.mine(testing::SEND_HASH, 3, TxStatus::Failed);

        let update = harness.provider.perform_next_action(&swap).await.unwrap().unwrap();
        assert_eq!(update.status, SwapStatus::Failed);
        assert!(update.end_time.is_some());
        assert_eq!(harness.balances.calls(), vec![vec!["USDC".to_string()]]);
    }

    #[tokio::test]
    async fn test_layer1_destination_looked_up_by_recipient() {
        let mut swap = testing::sample_swap(true);
        swap.status = SwapStatus::DestinationPending;
        swap.swap_tx_hash = Some(testing::SEND_HASH);
        let since = swap.created_at.timestamp();

        let mut index = MockTransferIndex::new();
        index.expect_find_transfer_id().times(0);
        index
            .expect_find_destination_tx_hash()
            .withf(move |chain, lookup| {
                chain.slug == "polygon"
                    && *lookup
                        == DestinationLookup::ByRecipient {
                            recipient: testing::test_address(),
                            since,
                        }
            })
            .times(1)
            .returning(|_, _| Ok(Some(testing::RECEIVE_HASH)));

        let harness = Harness::builder().index(Arc::new(index)).build();

        let update = harness.provider.perform_next_action(&swap).await.unwrap().unwrap();
        assert_eq!(update.status, SwapStatus::Success);
        assert_eq!(update.receive_tx_hash, Some(testing::RECEIVE_HASH));
    }

    #[tokio::test]
    async fn test_layer2_destination_resolves_transfer_id_first() {
        let mut seq = Sequence::new();
        let mut index = MockTransferIndex::new();
        index
            .expect_find_transfer_id()
            .withf(|chain, hash| chain.slug == "polygon" && *hash == testing::SEND_HASH)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some("0xfeed".to_string())));
        index
            .expect_find_destination_tx_hash()
            .withf(|chain, lookup| {
                chain.slug == "ethereum"
                    && *lookup == DestinationLookup::ByTransferId("0xfeed".to_string())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(testing::RECEIVE_HASH)));

        let harness = Harness::builder().index(Arc::new(index)).build();
        let mut swap = testing::sample_swap(false);
        swap.status = SwapStatus::DestinationPending;
        swap.swap_tx_hash = Some(testing::SEND_HASH);

        let update = harness.provider.perform_next_action(&swap).await.unwrap().unwrap();
        assert_eq!(update.status, SwapStatus::Success);
    }

    #[tokio::test]
    async fn test_unindexed_transfer_waits() {
        let mut index = MockTransferIndex::new();
        index.expect_find_transfer_id().returning(|_, _| Ok(None));
        index.expect_find_destination_tx_hash().times(0);

        let harness = Harness::builder().index(Arc::new(index)).build();
        let mut swap = testing::sample_swap(false);
        swap.status = SwapStatus::DestinationPending;
        swap.swap_tx_hash = Some(testing::SEND_HASH);

        assert!(harness.provider.perform_next_action(&swap).await.unwrap().is_none());
    }
}
