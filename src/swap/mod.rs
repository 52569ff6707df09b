//! Swap module - provider interface and the lifecycle state machine
//!
//! A [`SwapProvider`] knows how to quote a route and how to perform the one
//! action the current status of a swap calls for. The [`SwapStateMachine`]
//! decides when to run that action: under the asset lock for submissions,
//! inside a backoff polling cycle for confirmations, and persists each
//! resulting transition.

pub mod hop;
pub mod machine;

#[cfg(test)]
pub(crate) mod testing;

pub use hop::HopSwapProvider;
pub use machine::{SwapStateMachine, SwapTransition};

use crate::error::SwapResult;
use crate::models::{FeeTier, Network, Quote, QuoteRequest, Swap, SwapUpdate, TxType};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use tracing::info;

/// A bridge or exchange able to carry out swaps
#[async_trait]
pub trait SwapProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Pairs are resolved per request; providers may return an empty list
    async fn get_supported_pairs(&self) -> SwapResult<Vec<(String, String)>>;

    /// `None` when there is no route for the pair or amount
    async fn get_quote(&self, request: &QuoteRequest) -> SwapResult<Option<Quote>>;

    /// Create the swap record for a quote and submit its approval. The
    /// returned record is in `ApprovalPending`.
    async fn new_swap(
        &self,
        network: Network,
        wallet_id: &str,
        from_account_id: &str,
        quote: &Quote,
    ) -> SwapResult<Swap>;

    /// One attempt at the action for the swap's current status. `None`
    /// means nothing is ready yet.
    async fn perform_next_action(&self, swap: &Swap) -> SwapResult<Option<SwapUpdate>>;

    /// Fee per tier in currency units of the source chain's native asset
    async fn estimate_fees(
        &self,
        tx_type: TxType,
        quote: &Quote,
        tiers: &[FeeTier],
    ) -> SwapResult<Option<BTreeMap<FeeTier, BigDecimal>>>;
}

/// Hook for refreshing wallet balances after funds move
#[async_trait]
pub trait BalanceUpdater: Send + Sync {
    async fn update_balances(&self, network: Network, wallet_id: &str, assets: &[String]);
}

/// Balance hook for deployments without a wallet backend
pub struct LoggingBalanceUpdater;

#[async_trait]
impl BalanceUpdater for LoggingBalanceUpdater {
    async fn update_balances(&self, network: Network, wallet_id: &str, assets: &[String]) {
        info!(
            "Balance refresh requested for wallet {} on {}: {}",
            wallet_id,
            network,
            assets.join(", ")
        );
        crate::metrics::record_balance_refresh();
    }
}
