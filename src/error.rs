//! Error types for the bridge swap provider

use thiserror::Error;

/// Main error type for swap operations
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Chain client error: {0}")]
    ChainClient(String),

    #[error("Transaction {tx_hash} not found")]
    TransactionNotFound { tx_hash: String },

    #[error("Indexer error on {chain}: {message}")]
    Indexer { chain: String, message: String },

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("No bridge route from {from} to {to}")]
    UnsupportedRoute { from: String, to: String },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Swap {id} not found")]
    SwapNotFound { id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Transaction or record is not visible yet; the next poll may see it
    pub fn is_not_found(&self) -> bool {
        matches!(self, SwapError::TransactionNotFound { .. })
    }

    /// Check if error is retryable by the polling scheduler
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwapError::TransactionNotFound { .. } | SwapError::Indexer { .. }
        )
    }
}

/// Result type for swap operations
pub type SwapResult<T> = Result<T, SwapError>;
