//! Row storage backing database nodes
//!
//! Provides the `Store` trait and an in-memory backend. A `Database` node
//! wraps a store and turns store-typed feedback into store operations.
//!
//! # Backends
//!
//! - `InMemoryStore`: ordered in-memory rows with token-overlap lookup
//!
//! # Example
//!
//! ```
//! use afinar::storage::{InMemoryStore, Store};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let store = InMemoryStore::new();
//! store.insert([("luna".to_string(), json!("Princess of the night"))].into()).await.unwrap();
//! let hits = store.query("who is luna", 1).await.unwrap();
//! assert_eq!(hits[0].0, "luna");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Rows keyed by string
pub type Rows = BTreeMap<String, serde_json::Value>;

/// Trait for row storage backends
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a database node may be applied
/// concurrently with other parameters.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert rows, replacing existing keys
    async fn insert(&self, rows: Rows) -> Result<()>;

    /// Up to `top_k` rows relevant to `query`, most relevant first
    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<(String, serde_json::Value)>>;

    /// Remove a row. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Whether a row exists
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Replace an existing row's value, returning the previous one.
    ///
    /// Updating a missing key is a no-op that returns `None`.
    async fn update(&self, key: &str, value: serde_json::Value) -> Result<Option<serde_json::Value>>;

    /// A row's value
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Number of rows
    async fn len(&self) -> Result<usize>;

    /// Whether the store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
