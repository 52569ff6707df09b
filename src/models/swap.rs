//! Swap record and its lifecycle

use super::{unit_to_currency, AssetRegistry, ChainDescriptor, Network, Quote};
use crate::error::{SwapError, SwapResult};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use ethers::types::H256;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const TOTAL_STEPS: u8 = 4;
pub const TIMELINE_STEPS: [&str; 3] = ["APPROVE", "INITIATION", "RECEIVE"];

/// Swap lifecycle. Variants are declared in forward order; `Failed` is
/// reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    Quoted,
    ApprovalPending,
    ApprovalConfirmed,
    SendPending,
    DestinationPending,
    Success,
    Failed,
}

/// Coarse grouping used by history filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterStatus {
    Pending,
    Completed,
    Refunded,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Quoted => "QUOTED",
            SwapStatus::ApprovalPending => "APPROVAL_PENDING",
            SwapStatus::ApprovalConfirmed => "APPROVAL_CONFIRMED",
            SwapStatus::SendPending => "SEND_PENDING",
            SwapStatus::DestinationPending => "DESTINATION_PENDING",
            SwapStatus::Success => "SUCCESS",
            SwapStatus::Failed => "FAILED",
        }
    }

    /// Forward successor, `None` for terminal statuses
    pub fn next(&self) -> Option<SwapStatus> {
        match self {
            SwapStatus::Quoted => Some(SwapStatus::ApprovalPending),
            SwapStatus::ApprovalPending => Some(SwapStatus::ApprovalConfirmed),
            SwapStatus::ApprovalConfirmed => Some(SwapStatus::SendPending),
            SwapStatus::SendPending => Some(SwapStatus::DestinationPending),
            SwapStatus::DestinationPending => Some(SwapStatus::Success),
            SwapStatus::Success | SwapStatus::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Success | SwapStatus::Failed)
    }

    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == SwapStatus::Failed || self.next() == Some(next)
    }

    /// Statuses that wait on chain or indexer state
    pub fn is_polling(&self) -> bool {
        matches!(
            self,
            SwapStatus::ApprovalPending | SwapStatus::SendPending | SwapStatus::DestinationPending
        )
    }

    /// Statuses whose action submits funds and must run under the asset lock
    pub fn requires_lock(&self) -> bool {
        matches!(self, SwapStatus::Quoted | SwapStatus::ApprovalConfirmed)
    }

    pub fn step(&self) -> u8 {
        match self {
            SwapStatus::Quoted | SwapStatus::ApprovalPending => 0,
            SwapStatus::ApprovalConfirmed | SwapStatus::SendPending => 1,
            SwapStatus::DestinationPending => 2,
            SwapStatus::Success | SwapStatus::Failed => 3,
        }
    }

    /// Label template; `{from}` and `{to}` are replaced by asset symbols
    pub fn label(&self) -> &'static str {
        match self {
            SwapStatus::Quoted | SwapStatus::ApprovalPending => "Approving {from}",
            SwapStatus::ApprovalConfirmed | SwapStatus::SendPending => "Swapping {from}",
            SwapStatus::DestinationPending => "Swapping {to}",
            SwapStatus::Success => "Completed",
            SwapStatus::Failed => "Swap Failed",
        }
    }

    pub fn filter_status(&self) -> FilterStatus {
        match self {
            SwapStatus::Success => FilterStatus::Completed,
            SwapStatus::Failed => FilterStatus::Refunded,
            _ => FilterStatus::Pending,
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted swap record. Mutated only through [`Swap::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap {
    pub id: Uuid,
    pub provider: String,
    pub network: Network,
    pub wallet_id: String,
    pub from_account_id: String,
    pub from: String,
    pub to: String,
    pub from_amount: BigDecimal,
    pub to_amount: BigDecimal,
    pub bonder_fee: BigDecimal,
    pub destination_fee: BigDecimal,
    pub bridge_asset: String,
    pub chain_from: ChainDescriptor,
    pub chain_to: ChainDescriptor,
    pub slippage_bps: u32,
    pub status: SwapStatus,
    pub approve_tx_hash: Option<H256>,
    pub swap_tx_hash: Option<H256>,
    pub receive_tx_hash: Option<H256>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Swap {
    /// New record in `Quoted` status
    pub fn from_quote(
        provider: &str,
        network: Network,
        wallet_id: &str,
        from_account_id: &str,
        quote: &Quote,
        slippage_bps: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider: provider.to_string(),
            network,
            wallet_id: wallet_id.to_string(),
            from_account_id: from_account_id.to_string(),
            from: quote.from.clone(),
            to: quote.to.clone(),
            from_amount: quote.from_amount.clone(),
            to_amount: quote.to_amount.clone(),
            bonder_fee: quote.bonder_fee.clone(),
            destination_fee: quote.destination_fee.clone(),
            bridge_asset: quote.bridge_asset.clone(),
            chain_from: quote.chain_from.clone(),
            chain_to: quote.chain_to.clone(),
            slippage_bps,
            status: SwapStatus::Quoted,
            approve_tx_hash: None,
            swap_tx_hash: None,
            receive_tx_hash: None,
            created_at: now,
            updated_at: now,
            end_time: None,
        }
    }

    /// Quote fields of this swap, fixed at quote time
    pub fn quote(&self) -> Quote {
        Quote {
            from: self.from.clone(),
            to: self.to.clone(),
            from_amount: self.from_amount.clone(),
            to_amount: self.to_amount.clone(),
            bonder_fee: self.bonder_fee.clone(),
            destination_fee: self.destination_fee.clone(),
            bridge_asset: self.bridge_asset.clone(),
            chain_from: self.chain_from.clone(),
            chain_to: self.chain_to.clone(),
        }
    }

    /// Apply a transition, rejecting anything but a single forward step or failure
    pub fn apply(&mut self, update: &SwapUpdate) -> SwapResult<()> {
        if !self.status.can_transition_to(update.status) {
            return Err(SwapError::InvalidStateTransition {
                from: self.status.to_string(),
                to: update.status.to_string(),
            });
        }

        self.status = update.status;
        if let Some(hash) = update.approve_tx_hash {
            self.approve_tx_hash = Some(hash);
        }
        if let Some(hash) = update.swap_tx_hash {
            self.swap_tx_hash = Some(hash);
        }
        if let Some(hash) = update.receive_tx_hash {
            self.receive_tx_hash = Some(hash);
        }
        if update.end_time.is_some() {
            self.end_time = update.end_time;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn render_label(&self) -> String {
        self.status
            .label()
            .replace("{from}", &self.from)
            .replace("{to}", &self.to)
    }

    /// User-facing notification for the current status, if it has one
    pub fn notification(&self, registry: &AssetRegistry) -> Option<String> {
        match self.status {
            SwapStatus::ApprovalPending => Some(format!("Approving {}", self.from)),
            SwapStatus::SendPending | SwapStatus::DestinationPending => {
                Some("Engaging the unicorn".to_string())
            }
            SwapStatus::Success => {
                let amount = registry
                    .asset(&self.to)
                    .map(|asset| unit_to_currency(asset.decimals, &self.to_amount))
                    .unwrap_or_else(|_| self.to_amount.clone());
                Some(format!("Swap completed, {} {} ready to use", amount, self.to))
            }
            SwapStatus::Failed => Some("Swap failed".to_string()),
            SwapStatus::Quoted | SwapStatus::ApprovalConfirmed => None,
        }
    }
}

/// Changes produced by one transition
#[derive(Debug, Clone, PartialEq)]
pub struct SwapUpdate {
    pub status: SwapStatus,
    pub approve_tx_hash: Option<H256>,
    pub swap_tx_hash: Option<H256>,
    pub receive_tx_hash: Option<H256>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SwapUpdate {
    pub fn status(status: SwapStatus) -> Self {
        Self {
            status,
            approve_tx_hash: None,
            swap_tx_hash: None,
            receive_tx_hash: None,
            end_time: None,
        }
    }

    pub fn with_approve_tx(mut self, hash: Option<H256>) -> Self {
        self.approve_tx_hash = hash;
        self
    }

    pub fn with_swap_tx(mut self, hash: H256) -> Self {
        self.swap_tx_hash = Some(hash);
        self
    }

    pub fn with_receive_tx(mut self, hash: H256) -> Self {
        self.receive_tx_hash = Some(hash);
        self
    }

    pub fn ended(mut self) -> Self {
        self.end_time = Some(Utc::now());
        self
    }
}

#[cfg(test)]
pub(crate) fn sample_swap(chain_from_l1: bool) -> Swap {
    let (chain_from, chain_to) = if chain_from_l1 {
        (
            ChainDescriptor { slug: "ethereum".into(), chain_id: 1, is_layer1: true },
            ChainDescriptor { slug: "polygon".into(), chain_id: 137, is_layer1: false },
        )
    } else {
        (
            ChainDescriptor { slug: "polygon".into(), chain_id: 137, is_layer1: false },
            ChainDescriptor { slug: "ethereum".into(), chain_id: 1, is_layer1: true },
        )
    };
    let (from, to) = if chain_from_l1 { ("USDC", "PUSDC") } else { ("PUSDC", "USDC") };
    let quote = Quote {
        from: from.to_string(),
        to: to.to_string(),
        from_amount: BigDecimal::from(100),
        to_amount: BigDecimal::from(98),
        bonder_fee: BigDecimal::from(1),
        destination_fee: "0.5".parse().unwrap(),
        bridge_asset: "USDC".to_string(),
        chain_from,
        chain_to,
    };
    Swap::from_quote("hop", Network::Mainnet, "default", "acc-0", &quote, 50)
}
