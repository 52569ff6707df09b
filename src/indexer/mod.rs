//! Indexer module - read-only transfer lookups against per-chain datasets
//!
//! Empty results are a normal "not indexed yet" state and come back as
//! `Ok(None)`. Unreachable or malformed endpoints surface as
//! `SwapError::Indexer`, which the scheduler retries.

pub mod subgraph;

pub use subgraph::SubgraphIndex;

use crate::error::SwapResult;
use crate::models::ChainDescriptor;

use async_trait::async_trait;
use ethers::types::{Address, H256};

/// Key used to find the destination leg of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationLookup {
    /// Transfers leaving layer 2, matched exactly
    ByTransferId(String),
    /// Transfers leaving layer 1 carry no transfer id on the destination
    /// side. The most recent completion for the recipient at or after
    /// `since` (unix seconds) is taken, which can still pick the wrong
    /// transfer when one recipient has several in flight.
    ByRecipient { recipient: Address, since: i64 },
}

impl DestinationLookup {
    /// Lookup for a route: by recipient only when crossing out of layer 1
    pub fn crosses_from_layer1(chain_from: &ChainDescriptor, chain_to: &ChainDescriptor) -> bool {
        chain_from.is_layer1 && !chain_to.is_layer1
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferIndex: Send + Sync {
    /// Transfer id emitted by a send transaction on the source chain
    async fn find_transfer_id(
        &self,
        chain_from: &ChainDescriptor,
        tx_hash: H256,
    ) -> SwapResult<Option<String>>;

    /// Destination transaction completing a transfer
    async fn find_destination_tx_hash(
        &self,
        chain_to: &ChainDescriptor,
        lookup: &DestinationLookup,
    ) -> SwapResult<Option<H256>>;
}
