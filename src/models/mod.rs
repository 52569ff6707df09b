//! Domain types shared by the gateway, the indexer and the swap state machine

mod amount;
mod asset;
mod quote;
mod swap;

pub use amount::{currency_to_unit, to_u256, unit_to_currency};
pub use asset::{AssetDescriptor, AssetRegistry, ChainDescriptor, Network};
pub use quote::{FeeTier, Quote, QuoteRequest, RouteQuote, TxType};
pub use swap::{FilterStatus, Swap, SwapStatus, SwapUpdate, TIMELINE_STEPS, TOTAL_STEPS};

#[cfg(test)]
pub(crate) use swap::sample_swap;
