//! Embedding gateway.
//!
//! Turns text into vectors through a pluggable backend, tolerating several
//! response shapes and provisioning missing models on demand.

pub mod extract;
pub mod provider;
pub mod providers;

pub use extract::{default_extractors, EmbeddingExtractor, Extraction};
pub use provider::{create_backend, EmbeddingBackend};

use std::sync::Arc;

use futures::{stream, StreamExt};
use ragline_core::{AppError, AppResult};
use ragline_llm::providers::ollama::model_matches;

use crate::types::Chunk;
use extract::{extract_embedding, response_snippet};

/// Text embedded once when the dimensionality is not configured.
pub const PROBE_TEXT: &str = "probe";

/// Chunks that were embedded, in input order, and the count of those that were not.
#[derive(Debug, Default)]
pub struct EmbeddedBatch {
    pub embedded: Vec<(Chunk, Vec<f32>)>,
    pub dropped: usize,
}

pub struct EmbeddingGateway {
    backend: Arc<dyn EmbeddingBackend>,
    model: String,
    extractors: Vec<Box<dyn EmbeddingExtractor>>,
    batch_size: usize,
    concurrency: usize,
}

impl std::fmt::Debug for EmbeddingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("backend", &self.backend.backend_name())
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl EmbeddingGateway {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        model: impl Into<String>,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            extractors: default_extractors(),
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Embed one text.
    ///
    /// If no strategy recognizes the response, the model is provisioned when
    /// the backend does not list it, and the request is retried exactly once.
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let first = self.backend.request_embedding(&self.model, text).await?;
        let first_error = match extract_embedding(&self.extractors, &first) {
            Ok(vector) => return Ok(vector),
            Err(e) => e,
        };
        tracing::warn!("Embedding with model '{}' failed: {}", self.model, first_error);

        self.provision().await;

        let second = self.backend.request_embedding(&self.model, text).await?;
        extract_embedding(&self.extractors, &second).map_err(|_| {
            AppError::EmbeddingUnavailable {
                model: self.model.clone(),
                input_len: text.chars().count(),
                snippet: response_snippet(&first),
            }
        })
    }

    /// Pull the model if the backend does not list it.
    async fn provision(&self) {
        match self.backend.list_models().await {
            Ok(models) if models.iter().any(|m| model_matches(m, &self.model)) => {
                tracing::debug!("Model '{}' is installed; retrying once", self.model);
            }
            Ok(_) => {
                tracing::info!("Model '{}' not installed; pulling", self.model);
                if let Err(e) = self.backend.pull_model(&self.model).await {
                    tracing::warn!("Pulling model '{}' failed: {}", self.model, e);
                }
            }
            Err(e) => tracing::warn!("Could not list models: {}", e),
        }
    }

    /// Learn the vector size by embedding [`PROBE_TEXT`].
    pub async fn probe_dimensions(&self) -> AppResult<usize> {
        let vector = self.embed(PROBE_TEXT).await?;
        tracing::info!(
            "Model '{}' produces {}-dimensional vectors",
            self.model,
            vector.len()
        );
        Ok(vector.len())
    }

    /// Embed chunks in fixed-size batches with bounded concurrency.
    ///
    /// Failures are per chunk: a failed or wrong-length embedding excludes
    /// only that chunk, which is counted in `dropped`.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>, expected_dim: usize) -> EmbeddedBatch {
        let mut batch = EmbeddedBatch::default();
        let mut remaining = chunks.into_iter().peekable();

        while remaining.peek().is_some() {
            let group: Vec<Chunk> = remaining.by_ref().take(self.batch_size).collect();
            let _timer = ragline_core::logging::Stopwatch::start(format!(
                "embed batch of {}",
                group.len()
            ));

            let results: Vec<(Chunk, AppResult<Vec<f32>>)> = stream::iter(group)
                .map(|chunk| async move {
                    let result = self.embed(&chunk.text).await;
                    (chunk, result)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

            for (chunk, result) in results {
                match result {
                    Ok(vector) if vector.iter().all(|x| *x == 0.0) => {
                        tracing::warn!(
                            "Dropping chunk {} of '{}': embedding is a zero vector",
                            chunk.section(),
                            chunk.source_name
                        );
                        batch.dropped += 1;
                    }
                    Ok(vector) if vector.len() == expected_dim => {
                        batch.embedded.push((chunk, vector));
                    }
                    Ok(vector) => {
                        tracing::warn!(
                            "Dropping chunk {} of '{}': vector has {} dimensions, expected {}",
                            chunk.section(),
                            chunk.source_name,
                            vector.len(),
                            expected_dim
                        );
                        batch.dropped += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Dropping chunk {} of '{}': {}",
                            chunk.section(),
                            chunk.source_name,
                            e
                        );
                        batch.dropped += 1;
                    }
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend that answers from a fixed body, optionally failing for some texts.
    #[derive(Debug)]
    struct FixedBackend {
        body: Value,
        failing_texts: HashSet<String>,
        installed: Vec<String>,
        requests: AtomicUsize,
        pulls: Mutex<Vec<String>>,
    }

    impl FixedBackend {
        fn new(body: Value) -> Self {
            Self {
                body,
                failing_texts: HashSet::new(),
                installed: Vec::new(),
                requests: AtomicUsize::new(0),
                pulls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingBackend for FixedBackend {
        fn backend_name(&self) -> &str {
            "fixed"
        }

        async fn request_embedding(&self, _model: &str, text: &str) -> AppResult<Value> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.failing_texts.contains(text) {
                return Ok(json!({"error": "boom"}));
            }
            Ok(self.body.clone())
        }

        async fn list_models(&self) -> AppResult<Vec<String>> {
            Ok(self.installed.clone())
        }

        async fn pull_model(&self, model: &str) -> AppResult<()> {
            self.pulls.lock().unwrap().push(model.to_string());
            Ok(())
        }
    }

    fn chunk(text: &str, position: usize) -> Chunk {
        Chunk {
            id: format!("id-{}", position),
            text: text.to_string(),
            source_name: "doc.md".to_string(),
            position,
            total: 30,
        }
    }

    #[tokio::test]
    async fn test_unrecognized_shape_pulls_and_retries_once() {
        let backend = Arc::new(FixedBackend::new(json!({"vector": [0.1, 0.2]})));
        let gateway = EmbeddingGateway::new(backend.clone(), "bge-m3", 12, 4);

        match gateway.embed("hello there").await {
            Err(AppError::EmbeddingUnavailable {
                model,
                input_len,
                snippet,
            }) => {
                assert_eq!(model, "bge-m3");
                assert_eq!(input_len, 11);
                assert!(snippet.contains("\"vector\""));
            }
            other => panic!("expected EmbeddingUnavailable, got {:?}", other),
        }

        assert_eq!(backend.requests.load(Ordering::SeqCst), 2);
        assert_eq!(*backend.pulls.lock().unwrap(), vec!["bge-m3".to_string()]);
    }

    #[tokio::test]
    async fn test_installed_model_not_pulled() {
        let mut backend = FixedBackend::new(json!({"vector": [0.1]}));
        backend.installed = vec!["bge-m3:latest".to_string()];
        let backend = Arc::new(backend);
        let gateway = EmbeddingGateway::new(backend.clone(), "bge-m3", 12, 4);

        assert!(gateway.embed("text").await.is_err());
        assert_eq!(backend.requests.load(Ordering::SeqCst), 2);
        assert!(backend.pulls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_drops_only_failing_chunks() {
        let mut backend = FixedBackend::new(json!({"embedding": [1.0, 0.0, 0.0]}));
        backend.failing_texts.insert("bad chunk".to_string());
        let gateway = EmbeddingGateway::new(Arc::new(backend), "bge-m3", 12, 4);

        let chunks: Vec<Chunk> = (0..30)
            .map(|i| {
                if i == 7 || i == 20 {
                    chunk("bad chunk", i)
                } else {
                    chunk(&format!("good chunk {}", i), i)
                }
            })
            .collect();

        let batch = gateway.embed_chunks(chunks, 3).await;
        assert_eq!(batch.dropped, 2);
        assert_eq!(batch.embedded.len(), 28);

        // Input order survives, failed chunks are absent
        let positions: Vec<usize> = batch.embedded.iter().map(|(c, _)| c.position).collect();
        assert!(!positions.contains(&7));
        assert!(!positions.contains(&20));
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(batch.embedded.iter().all(|(_, v)| v.iter().any(|x| *x != 0.0)));
    }

    #[tokio::test]
    async fn test_batch_drops_wrong_length_vectors() {
        let backend = FixedBackend::new(json!({"embedding": [1.0, 0.0]}));
        let gateway = EmbeddingGateway::new(Arc::new(backend), "bge-m3", 2, 2);

        let batch = gateway
            .embed_chunks(vec![chunk("a", 0), chunk("b", 1), chunk("c", 2)], 3)
            .await;
        assert!(batch.embedded.is_empty());
        assert_eq!(batch.dropped, 3);
    }

    #[tokio::test]
    async fn test_batch_drops_zero_vectors() {
        let backend = FixedBackend::new(json!({"embedding": [0.0, 0.0, 0.0]}));
        let gateway = EmbeddingGateway::new(Arc::new(backend), "bge-m3", 4, 2);

        let batch = gateway.embed_chunks(vec![chunk("a", 0), chunk("b", 1)], 3).await;
        assert!(batch.embedded.is_empty());
        assert_eq!(batch.dropped, 2);
    }

    #[tokio::test]
    async fn test_mock_stop_word_chunk_is_dropped() {
        let gateway = EmbeddingGateway::new(
            Arc::new(providers::MockBackend::new(64)),
            "trigram-v1",
            4,
            2,
        );

        let batch = gateway
            .embed_chunks(
                vec![
                    chunk("it is at on a an as to of in and or but by be", 0),
                    chunk("ownership rules govern memory safety", 1),
                ],
                64,
            )
            .await;
        assert_eq!(batch.dropped, 1);
        assert_eq!(batch.embedded.len(), 1);
        assert_eq!(batch.embedded[0].0.position, 1);
    }

    #[tokio::test]
    async fn test_probe_dimensions() {
        let backend = providers::MockBackend::new(96);
        let gateway = EmbeddingGateway::new(Arc::new(backend), "trigram-v1", 12, 4);
        assert_eq!(gateway.probe_dimensions().await.unwrap(), 96);
    }
}
