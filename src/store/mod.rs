//! Swap persistence
//!
//! The store is the only durable state of a swap. Every transition goes
//! through [`SwapStore::update`], which validates it with [`Swap::apply`].

mod memory;
mod postgres;

pub use memory::MemorySwapStore;
pub use postgres::PgSwapStore;

use crate::error::SwapResult;
use crate::models::{Swap, SwapUpdate};

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn insert(&self, swap: &Swap) -> SwapResult<()>;

    /// Fails with `SwapError::SwapNotFound` for unknown ids
    async fn get(&self, id: Uuid) -> SwapResult<Swap>;

    /// Apply an update atomically and return the new record
    async fn update(&self, id: Uuid, update: &SwapUpdate) -> SwapResult<Swap>;

    /// All swaps, newest first
    async fn list(&self) -> SwapResult<Vec<Swap>>;

    /// Swaps that have not reached a terminal status
    async fn list_active(&self) -> SwapResult<Vec<Swap>>;
}
