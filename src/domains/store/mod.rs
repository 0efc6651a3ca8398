//! Tool metadata store.
//!
//! The registry only needs two operations from durable storage: list every
//! stored definition, and insert a new one. [`SqliteStore`] provides both and
//! also serves as the [`SqlBackend`](crate::domains::tools::SqlBackend) for
//! SQL_READ tools.

mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::domains::tools::ToolDefinition;

pub use sqlite::SqliteStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error reported by SQLite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored JSON column could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking store task failed to complete.
    #[error("Store task failed: {0}")]
    Task(String),
}

/// Durable storage for tool definitions.
#[async_trait]
pub trait ToolStore: Send + Sync {
    /// All stored definitions, in store order.
    async fn list(&self) -> StoreResult<Vec<ToolDefinition>>;

    /// Persist a definition and return its assigned id.
    async fn insert(&self, definition: &ToolDefinition) -> StoreResult<i64>;
}
