//! Swap lifecycle state machine
//!
//! All state lives in the stored swap record. Each step reads the record,
//! runs the provider action for its status and writes the resulting
//! transition back, so a fresh machine resumes any stored swap.

use super::SwapProvider;
use crate::error::SwapResult;
use crate::models::{Network, Quote, Swap, SwapStatus, SwapUpdate};
use crate::scheduler::RetryScheduler;
use crate::store::SwapStore;

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Published after every persisted transition
#[derive(Debug, Clone, PartialEq)]
pub struct SwapTransition {
    pub id: Uuid,
    pub from: SwapStatus,
    pub to: SwapStatus,
}

pub struct SwapStateMachine {
    provider: Arc<dyn SwapProvider>,
    store: Arc<dyn SwapStore>,
    scheduler: Arc<RetryScheduler>,
    events: broadcast::Sender<SwapTransition>,
}

impl SwapStateMachine {
    pub fn new(
        provider: Arc<dyn SwapProvider>,
        store: Arc<dyn SwapStore>,
        scheduler: Arc<RetryScheduler>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            provider,
            store,
            scheduler,
            events,
        }
    }

    pub fn provider(&self) -> &Arc<dyn SwapProvider> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn SwapStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<RetryScheduler> {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapTransition> {
        self.events.subscribe()
    }

    /// Start a swap for a quote: the approval is submitted and the record
    /// stored in `ApprovalPending`
    pub async fn create_swap(
        &self,
        network: Network,
        wallet_id: &str,
        from_account_id: &str,
        quote: &Quote,
    ) -> SwapResult<Swap> {
        let swap = self
            .provider
            .new_swap(network, wallet_id, from_account_id, quote)
            .await?;
        self.store.insert(&swap).await?;

        crate::metrics::record_swap_created(&swap.chain_from.slug, &swap.chain_to.slug);
        self.publish(swap.id, SwapStatus::Quoted, swap.status);
        Ok(swap)
    }

    /// Run the action for the swap's current status once. Returns the
    /// updated record, or `None` when no transition happened.
    ///
    /// Polling statuses wait inside a backoff cycle; only one cycle per swap
    /// runs at a time. Submissions run under the wallet's asset lock and
    /// re-read the record once the lock is held.
    pub async fn advance(&self, id: Uuid) -> SwapResult<Option<Swap>> {
        let swap = self.store.get(id).await?;
        if swap.status.is_terminal() {
            return Ok(None);
        }

        let update = if swap.status.requires_lock() {
            let _guard = self.scheduler.lock(&lock_key(&swap)).await;
            let current = self.store.get(id).await?;
            if current.status != swap.status {
                debug!("Swap {} already moved to {}", id, current.status);
                return Ok(None);
            }
            let update = self.provider.perform_next_action(&current).await?;
            // persist before releasing the lock
            return match update {
                Some(update) => self.record(&current, &update).await.map(Some),
                None => Ok(None),
            };
        } else if swap.status.is_polling() {
            let provider = &self.provider;
            let swap = &swap;
            self.scheduler
                .with_interval(&poll_key(id), || provider.perform_next_action(swap))
                .await?
        } else {
            self.provider.perform_next_action(&swap).await?
        };

        match update {
            Some(update) => self.record(&swap, &update).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drive a swap until it reaches a terminal status or a step ends
    /// without a transition.
    ///
    /// A step without a transition usually means the polling round ran out
    /// of attempts or another task holds the swap. The caller decides when
    /// to drive it again.
    pub async fn run_to_completion(&self, id: Uuid) -> SwapResult<Swap> {
        loop {
            let swap = self.store.get(id).await?;
            if swap.status.is_terminal() || self.scheduler.is_stopped().await {
                return Ok(swap);
            }

            match self.advance(id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("Swap {} left in {} until the next round", id, swap.status);
                    return self.store.get(id).await;
                }
                Err(e) => {
                    error!("Swap {} stuck in {}: {}", id, swap.status, e);
                    return Err(e);
                }
            }
        }
    }

    async fn record(&self, swap: &Swap, update: &SwapUpdate) -> SwapResult<Swap> {
        let updated = self.store.update(swap.id, update).await?;
        info!("Swap {}: {} -> {}", swap.id, swap.status, updated.status);

        crate::metrics::record_transition(swap.status, updated.status);
        if updated.status.is_terminal() {
            let duration = updated
                .end_time
                .map(|end| (end - updated.created_at).num_milliseconds() as f64 / 1000.0);
            crate::metrics::record_terminal(updated.status, duration);
        }
        self.publish(swap.id, swap.status, updated.status);
        Ok(updated)
    }

    fn publish(&self, id: Uuid, from: SwapStatus, to: SwapStatus) {
        // no subscribers is fine
        let _ = self.events.send(SwapTransition { id, from, to });
    }
}

/// One submission per asset per wallet at a time
fn lock_key(swap: &Swap) -> String {
    format!("{}:{}:{}", swap.wallet_id, swap.network, swap.from)
}

fn poll_key(id: Uuid) -> String {
    format!("swap:{}", id)
}
