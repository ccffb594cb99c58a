//! Vector store abstraction.
//!
//! Stores hold named collections of fixed-dimensionality vectors with
//! payloads. [`VectorStoreManager`] sits on top and owns collection
//! lifecycle and migration.

pub mod manager;
pub mod memory;
pub mod qdrant;

pub use manager::VectorStoreManager;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use std::sync::Arc;
use std::time::Duration;

use ragline_core::{AppConfig, AppError, AppResult};

use crate::types::{Collection, Hit, Point};

/// Trait for vector store backends.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    fn store_name(&self) -> &str;

    /// Shape of `name`, or `None` if it does not exist.
    async fn describe_collection(&self, name: &str) -> AppResult<Option<Collection>>;

    async fn create_collection(&self, collection: &Collection) -> AppResult<()>;

    /// Delete `name`; returns whether it existed.
    async fn delete_collection(&self, name: &str) -> AppResult<bool>;

    async fn list_collections(&self) -> AppResult<Vec<String>>;

    /// Insert or overwrite points by id.
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> AppResult<()>;

    /// Nearest neighbours of `vector`, best first, in the store's own order.
    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<Hit>>;

    async fn count(&self, collection: &str) -> AppResult<usize>;
}

/// Create a vector store based on configuration.
pub fn create_store(config: &AppConfig) -> AppResult<Arc<dyn VectorStore>> {
    match config.vector_store.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantStore::new(
            &config.vector_store.url,
            Duration::from_secs(config.vector_store.timeout_secs),
        )?)),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(AppError::Config(format!(
            "Unknown vector store provider: '{}'. Supported providers: qdrant, memory",
            other
        ))),
    }
}
