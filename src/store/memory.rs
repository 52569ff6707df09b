//! In-memory swap store, used when no database is configured

use super::SwapStore;
use crate::error::{SwapError, SwapResult};
use crate::models::{Swap, SwapUpdate};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct MemorySwapStore {
    swaps: DashMap<Uuid, Swap>,
}

impl MemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> SwapError {
    SwapError::SwapNotFound { id: id.to_string() }
}

#[async_trait]
impl SwapStore for MemorySwapStore {
    async fn insert(&self, swap: &Swap) -> SwapResult<()> {
        if self.swaps.contains_key(&swap.id) {
            return Err(SwapError::Internal(format!("Swap {} already stored", swap.id)));
        }
        self.swaps.insert(swap.id, swap.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SwapResult<Swap> {
        self.swaps
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: Uuid, update: &SwapUpdate) -> SwapResult<Swap> {
        let mut entry = self.swaps.get_mut(&id).ok_or_else(|| not_found(id))?;
        let mut swap = entry.value().clone();
        swap.apply(update)?;
        *entry.value_mut() = swap.clone();
        Ok(swap)
    }

    async fn list(&self) -> SwapResult<Vec<Swap>> {
        let mut swaps: Vec<Swap> = self.swaps.iter().map(|e| e.value().clone()).collect();
        swaps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(swaps)
    }

    async fn list_active(&self) -> SwapResult<Vec<Swap>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|swap| !swap.status.is_terminal())
            .collect())
    }
}
