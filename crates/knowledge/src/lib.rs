//! Document ingestion and grounded answering.
//!
//! Documents are chunked, embedded and written to a vector store; queries are
//! answered from the best-matching chunks by a generation backend. Everything
//! is wired together by [`Pipeline`].

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod loader;
pub mod pipeline;
pub mod rag;
pub mod retriever;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::ResponseCache;
pub use embeddings::EmbeddingGateway;
pub use loader::{DocumentLoader, FsLoader};
pub use pipeline::{Pipeline, PipelineSettings, StreamingAnswer};
pub use rag::{Answer, SourceRef};
pub use retriever::Retriever;
pub use store::{VectorStore, VectorStoreManager};
pub use types::{Chunk, Collection, CollectionStats, Document, Hit, IngestReport};
