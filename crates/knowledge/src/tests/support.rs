//! In-process fakes for pipeline scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ragline_core::config::{ChunkingSettings, RetrievalSettings};
use ragline_core::{AppError, AppResult, DistanceMetric};
use ragline_llm::{
    Generator, GenerationOptions, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk,
    LlmUsage, RetryPolicy,
};
use ragline_prompt::{builtin_prompt, ANSWER_PROMPT_ID};
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::embeddings::providers::MockBackend;
use crate::embeddings::{EmbeddingBackend, EmbeddingGateway};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::store::{MemoryStore, VectorStore, VectorStoreManager};
use crate::types::{Collection, Hit, Point};

/// Generation backend that answers `"answer #<n>"` and replays scripted streams.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    pub fail_complete: bool,
    pub streams: Mutex<Vec<Vec<AppResult<LlmStreamChunk>>>>,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn with_streams(streams: Vec<Vec<AppResult<LlmStreamChunk>>>) -> Self {
        Self {
            streams: Mutex::new(streams),
            ..Default::default()
        }
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let n = self.complete_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_complete {
            return Err(AppError::Llm("connection refused".to_string()));
        }
        Ok(LlmResponse {
            content: format!("answer #{}", n),
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }

    async fn stream(&self, _request: &LlmRequest) -> AppResult<LlmStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let mut streams = self.streams.lock().unwrap();
        let chunks = if streams.is_empty() {
            Vec::new()
        } else {
            streams.remove(0)
        };
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        Ok(vec!["llama3.2:latest".to_string()])
    }
}

pub fn content(text: &str) -> AppResult<LlmStreamChunk> {
    Ok(LlmStreamChunk {
        content: text.to_string(),
        done: false,
    })
}

pub fn done() -> AppResult<LlmStreamChunk> {
    Ok(LlmStreamChunk {
        content: String::new(),
        done: true,
    })
}

/// Trigram embeddings with a request counter.
///
/// Texts containing `failing_marker` get a response without a vector.
#[derive(Debug)]
pub struct CountingEmbedder {
    inner: MockBackend,
    calls: AtomicUsize,
    failing_marker: Option<String>,
}

impl CountingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: MockBackend::new(dimensions),
            calls: AtomicUsize::new(0),
            failing_marker: None,
        }
    }

    pub fn failing_on(dimensions: usize, marker: &str) -> Self {
        Self {
            failing_marker: Some(marker.to_string()),
            ..Self::new(dimensions)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingBackend for CountingEmbedder {
    fn backend_name(&self) -> &str {
        "counting"
    }

    async fn request_embedding(&self, model: &str, text: &str) -> AppResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.failing_marker {
            if text.contains(marker.as_str()) {
                return Ok(serde_json::json!({"error": "model crashed"}));
            }
        }
        self.inner.request_embedding(model, text).await
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        self.inner.list_models().await
    }

    async fn pull_model(&self, model: &str) -> AppResult<()> {
        self.inner.pull_model(model).await
    }
}

/// Memory store that rejects any batch containing a point from `rejected_source`.
#[derive(Debug)]
pub struct RejectingStore {
    pub inner: MemoryStore,
    pub rejected_source: String,
}

#[async_trait::async_trait]
impl VectorStore for RejectingStore {
    fn store_name(&self) -> &str {
        "rejecting"
    }

    async fn describe_collection(&self, name: &str) -> AppResult<Option<Collection>> {
        self.inner.describe_collection(name).await
    }

    async fn create_collection(&self, collection: &Collection) -> AppResult<()> {
        self.inner.create_collection(collection).await
    }

    async fn delete_collection(&self, name: &str) -> AppResult<bool> {
        self.inner.delete_collection(name).await
    }

    async fn list_collections(&self) -> AppResult<Vec<String>> {
        self.inner.list_collections().await
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> AppResult<()> {
        if points.iter().any(|p| p.payload.source == self.rejected_source) {
            return Err(AppError::Upsert {
                collection: collection.to_string(),
                reason: "payload too large".to_string(),
            });
        }
        self.inner.upsert(collection, points).await
    }

    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<Hit>> {
        self.inner.search(collection, vector, top_k).await
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        self.inner.count(collection).await
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub llm: Arc<ScriptedLlm>,
    pub embedder: Arc<CountingEmbedder>,
    pub store: Arc<dyn VectorStore>,
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        chunking: ChunkingSettings {
            max_tokens: 100,
            overlap_tokens: 20,
            min_chunk_chars: 40,
        },
        retrieval: RetrievalSettings {
            top_k: 5,
            max_context_chars: 6000,
        },
        distance: DistanceMetric::Cosine,
        dimensions: None,
    }
}

pub fn harness_with(
    store: Arc<dyn VectorStore>,
    dimensions: usize,
    llm: ScriptedLlm,
    ttl: Duration,
) -> Harness {
    harness_with_embedder(store, CountingEmbedder::new(dimensions), llm, ttl)
}

pub fn harness_with_embedder(
    store: Arc<dyn VectorStore>,
    embedder: CountingEmbedder,
    llm: ScriptedLlm,
    ttl: Duration,
) -> Harness {
    let llm = Arc::new(llm);
    let embedder = Arc::new(embedder);

    let generator = Generator::new(
        llm.clone(),
        GenerationOptions {
            model: "llama3.2".to_string(),
            temperature: 0.2,
            context_window: 3072,
            max_output_tokens: 512,
        },
        RetryPolicy::from_secs(&[5, 10]),
    );

    let pipeline = Pipeline::new(
        EmbeddingGateway::new(embedder.clone(), "trigram-v1", 12, 4),
        VectorStoreManager::new(store.clone(), "docs"),
        generator,
        builtin_prompt(ANSWER_PROMPT_ID).unwrap(),
        ResponseCache::new(ttl),
        settings(),
    );

    Harness {
        pipeline,
        llm,
        embedder,
        store,
    }
}

pub fn harness(llm: ScriptedLlm) -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        64,
        llm,
        Duration::from_secs(600),
    )
}
