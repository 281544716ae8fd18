//! Chainwatch persistence
//!
//! The [`Store`] trait is the persistence capability consumed by the ingestion engine.
//! Uniqueness of registered addresses, transaction hashes and block numbers is enforced by
//! the store itself: a duplicate create fails with [`StoreError::ConstraintViolation`].

/// Store error types
pub mod error;
/// Record types
pub mod models;
/// Table definitions
pub mod schema;
/// `SQLite` store
pub mod sqlite;

use async_trait::async_trait;

pub use error::StoreError;
pub use models::{BlockSummary, TrackedTransaction, WatchedAddress};
pub use sqlite::SqliteStore;

/// Append-only persistence for watched addresses, tracked transactions and block summaries
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Insert a watched address
    async fn create_address(&self, address: &str) -> Result<(), StoreError>;

    /// Look up a watched address by its exact text
    async fn find_address(&self, address: &str) -> Result<Option<WatchedAddress>, StoreError>;

    /// All watched addresses, in registration order
    async fn all_addresses(&self) -> Result<Vec<WatchedAddress>, StoreError>;

    /// Insert a tracked transaction
    async fn create_transaction(&self, tx: &TrackedTransaction) -> Result<(), StoreError>;

    /// Look up a tracked transaction by hash
    async fn find_transaction(&self, hash: &str)
    -> Result<Option<TrackedTransaction>, StoreError>;

    /// All tracked transactions, in insertion order
    async fn all_transactions(&self) -> Result<Vec<TrackedTransaction>, StoreError>;

    /// Number of tracked transactions
    async fn count_transactions(&self) -> Result<u64, StoreError>;

    /// Insert a block summary
    async fn create_block(&self, block: &BlockSummary) -> Result<(), StoreError>;

    /// Look up a block summary by number
    async fn find_block(&self, number: u64) -> Result<Option<BlockSummary>, StoreError>;

    /// Block summary with the highest block number
    async fn latest_block(&self) -> Result<Option<BlockSummary>, StoreError>;

    /// Number of block summaries
    async fn count_blocks(&self) -> Result<u64, StoreError>;
}
