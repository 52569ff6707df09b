//! Quotes produced by a swap provider

use super::{ChainDescriptor, Network};

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Request for a bridge quote; `amount` is in currency units of `from`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub network: Network,
    pub from: String,
    pub to: String,
    pub amount: BigDecimal,
}

/// Liquidity and fee parameters returned by the bridge for one route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuote {
    pub rate: BigDecimal,
    pub bonder_fee: BigDecimal,
    pub destination_fee: BigDecimal,
}

/// Immutable quote. Amounts and fees are integer minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub from: String,
    pub to: String,
    pub from_amount: BigDecimal,
    pub to_amount: BigDecimal,
    pub bonder_fee: BigDecimal,
    pub destination_fee: BigDecimal,
    pub bridge_asset: String,
    pub chain_from: ChainDescriptor,
    pub chain_to: ChainDescriptor,
}

impl Quote {
    pub fn total_fee(&self) -> BigDecimal {
        &self.bonder_fee + &self.destination_fee
    }
}

/// Transaction kinds a provider can estimate fees for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Swap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Slow,
    Average,
    Fast,
}

impl FeeTier {
    pub const ALL: [FeeTier; 3] = [FeeTier::Slow, FeeTier::Average, FeeTier::Fast];
}
