//! Bridge Swap - cross-chain token swaps over a canonical-token bridge
//!
//! Quotes routes through the bridge, submits approval and send
//! transactions, and follows each swap to its destination chain through a
//! transfer indexer. Swap records are persisted after every transition so
//! a restarted service resumes where it left off.

pub mod api;
pub mod bridge;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod swap;
