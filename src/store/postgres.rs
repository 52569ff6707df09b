//! PostgreSQL swap store

use super::SwapStore;
use crate::config::DatabaseConfig;
use crate::error::{SwapError, SwapResult};
use crate::models::{Swap, SwapUpdate};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// Swap records stored as JSONB, with status and timestamps broken out for
/// filtering
pub struct PgSwapStore {
    pool: PgPool,
}

impl PgSwapStore {
    pub async fn new(config: &DatabaseConfig) -> SwapResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> SwapResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS swaps (
                id UUID PRIMARY KEY,
                status VARCHAR(32) NOT NULL,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_swaps_status
            ON swaps (status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    pub async fn health_check(&self) -> SwapResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode(row: &PgRow) -> SwapResult<Swap> {
    let record: serde_json::Value = row.try_get("record")?;
    Ok(serde_json::from_value(record)?)
}

#[async_trait]
impl SwapStore for PgSwapStore {
    async fn insert(&self, swap: &Swap) -> SwapResult<()> {
        sqlx::query(
            r#"
            INSERT INTO swaps (id, status, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(swap.id)
        .bind(swap.status.as_str())
        .bind(serde_json::to_value(swap)?)
        .bind(swap.created_at)
        .bind(swap.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Stored swap {}", swap.id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SwapResult<Swap> {
        let row = sqlx::query("SELECT record FROM swaps WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| SwapError::SwapNotFound { id: id.to_string() })?;

        decode(&row)
    }

    async fn update(&self, id: Uuid, update: &SwapUpdate) -> SwapResult<Swap> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT record FROM swaps WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| SwapError::SwapNotFound { id: id.to_string() })?;

        let mut swap = decode(&row)?;
        swap.apply(update)?;

        sqlx::query(
            r#"
            UPDATE swaps
            SET status = $2, record = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(swap.status.as_str())
        .bind(serde_json::to_value(&swap)?)
        .bind(swap.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(swap)
    }

    async fn list(&self) -> SwapResult<Vec<Swap>> {
        let rows = sqlx::query("SELECT record FROM swaps ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode).collect()
    }

    async fn list_active(&self) -> SwapResult<Vec<Swap>> {
        let rows = sqlx::query(
            r#"
            SELECT record FROM swaps
            WHERE status NOT IN ('SUCCESS', 'FAILED')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode).collect()
    }
}
