//! Query-time retrieval: embed the query, search the active collection.

use std::sync::Arc;

use ragline_core::logging::Stopwatch;
use ragline_core::{AppResult, DistanceMetric};

use crate::embeddings::EmbeddingGateway;
use crate::store::VectorStoreManager;
use crate::types::Hit;

#[derive(Debug, Clone)]
pub struct Retriever {
    gateway: Arc<EmbeddingGateway>,
    manager: Arc<VectorStoreManager>,
    distance: DistanceMetric,
}

impl Retriever {
    pub fn new(
        gateway: Arc<EmbeddingGateway>,
        manager: Arc<VectorStoreManager>,
        distance: DistanceMetric,
    ) -> Self {
        Self {
            gateway,
            manager,
            distance,
        }
    }

    /// Ranked hits for `query`, best first.
    ///
    /// Blank queries return no hits without calling the embedding backend or
    /// the store. Embedding failures abort the request.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<Hit>> {
        if query.trim().is_empty() {
            tracing::debug!("Blank query; skipping retrieval");
            return Ok(Vec::new());
        }

        let _timer = Stopwatch::start("retrieve");
        let vector = self.gateway.embed(query).await?;
        let hits = self.manager.search(&vector, top_k, self.distance).await?;
        tracing::debug!("Retrieved {} hit(s) for top_k={}", hits.len(), top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::MockBackend;
    use crate::store::MemoryStore;
    use crate::types::{ChunkPayload, Point};

    #[derive(Debug)]
    struct CountingBackend {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl crate::embeddings::EmbeddingBackend for CountingBackend {
        fn backend_name(&self) -> &str {
            "counting"
        }

        async fn request_embedding(&self, _model: &str, _text: &str) -> AppResult<serde_json::Value> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(serde_json::json!({"embedding": [1.0, 0.0]}))
        }

        async fn list_models(&self) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn pull_model(&self, _model: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_calls() {
        let backend = Arc::new(CountingBackend {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let gateway = Arc::new(EmbeddingGateway::new(backend.clone(), "m", 12, 4));
        let manager = Arc::new(VectorStoreManager::new(Arc::new(MemoryStore::new()), "docs"));
        let retriever = Retriever::new(gateway, manager, DistanceMetric::Cosine);

        assert!(retriever.retrieve("   \n\t", 5).await.unwrap().is_empty());
        assert!(retriever.retrieve("", 5).await.unwrap().is_empty());
        assert_eq!(backend.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_text_first() {
        let mock = MockBackend::new(64);
        let gateway = Arc::new(EmbeddingGateway::new(Arc::new(MockBackend::new(64)), "m", 12, 4));
        let manager = Arc::new(VectorStoreManager::new(Arc::new(MemoryStore::new()), "docs"));
        let collection = manager.ensure_or_migrate(64, DistanceMetric::Cosine).await.unwrap();

        let texts = ["rust ownership borrowing lifetimes", "baking sourdough bread recipes"];
        let points = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Point {
                id: format!("p{}", i),
                vector: mock.embed_text(text),
                payload: ChunkPayload {
                    text: text.to_string(),
                    source: "notes.md".to_string(),
                    section: format!("{}/2", i + 1),
                    position: i,
                },
            })
            .collect();
        manager.upsert(&collection, points).await.unwrap();

        let retriever = Retriever::new(gateway, manager, DistanceMetric::Cosine);
        let hits = retriever.retrieve("rust borrowing rules", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "p0");
    }
}
