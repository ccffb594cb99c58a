//! Ingestion and query pipeline.
//!
//! Ingestion: chunk → embed → upsert. Querying: cache → retrieve → assemble
//! context → generate → cache. The response cache is the only state shared
//! between queries.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use ragline_core::config::{ChunkingSettings, RetrievalSettings};
use ragline_core::logging::Stopwatch;
use ragline_core::{AppConfig, AppResult, DistanceMetric};
use ragline_llm::{create_generator, error_event_stream, EventStream, GenerationEvent, Generator};
use ragline_prompt::{load_or_builtin, PromptDefinition, ANSWER_PROMPT_ID};
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::chunker::{build_chunks, chunk_text};
use crate::embeddings::{create_backend, EmbeddingGateway};
use crate::loader::FsLoader;
use crate::rag::{build_context, map_hits_to_sources, render_answer_prompt, Answer, SourceRef};
use crate::retriever::Retriever;
use crate::store::{create_store, VectorStoreManager};
use crate::types::{Collection, CollectionStats, Document, Hit, IngestReport};

/// Tunables the pipeline reads on every call.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub distance: DistanceMetric,
    /// Vector size; probed from the embedding backend when `None`
    pub dimensions: Option<usize>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chunking: config.chunking.clone(),
            retrieval: config.retrieval.clone(),
            distance: config.vector_store.distance,
            dimensions: config.embedding.dimensions,
        }
    }
}

/// A streamed answer: sources are known up front, text arrives as events.
pub struct StreamingAnswer {
    pub sources: Vec<SourceRef>,
    pub from_cache: bool,
    pub events: EventStream,
}

impl std::fmt::Debug for StreamingAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAnswer")
            .field("sources", &self.sources)
            .field("from_cache", &self.from_cache)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Pipeline {
    gateway: Arc<EmbeddingGateway>,
    manager: Arc<VectorStoreManager>,
    retriever: Retriever,
    generator: Generator,
    prompt: PromptDefinition,
    cache: Arc<ResponseCache>,
    loader: FsLoader,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        gateway: EmbeddingGateway,
        manager: VectorStoreManager,
        generator: Generator,
        prompt: PromptDefinition,
        cache: ResponseCache,
        settings: PipelineSettings,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let manager = Arc::new(manager);
        let retriever = Retriever::new(gateway.clone(), manager.clone(), settings.distance);

        Self {
            gateway,
            manager,
            retriever,
            generator,
            prompt,
            cache: Arc::new(cache),
            loader: FsLoader::new(),
            settings,
        }
    }

    /// Wire every component from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let gateway = EmbeddingGateway::new(
            create_backend(config)?,
            config.ollama.embedding_model.clone(),
            config.embedding.batch_size,
            config.embedding.concurrency,
        );
        let manager = VectorStoreManager::new(create_store(config)?, config.vector_store.collection.clone());
        let generator = create_generator(config)?;
        let prompt = load_or_builtin(&config.prompts_dir(), ANSWER_PROMPT_ID)?;
        let cache = ResponseCache::new(Duration::from_secs(config.cache.ttl_secs));

        info!(
            "Pipeline ready: embeddings via {} ({}), store '{}' ({}), generation model '{}'",
            gateway.backend_name(),
            gateway.model(),
            manager.base_name(),
            manager.store().store_name(),
            generator.options().model
        );

        Ok(Self::new(
            gateway,
            manager,
            generator,
            prompt,
            cache,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn manager(&self) -> &VectorStoreManager {
        &self.manager
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Load files and directories, then [`Self::ingest`] them.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> AppResult<IngestReport> {
        let documents = self.loader.load_documents(paths);
        info!("Loaded {} source(s)", documents.len());
        self.ingest(documents).await
    }

    /// Chunk, embed and upsert `documents`.
    ///
    /// Failures are isolated: an empty document, a document without chunks,
    /// one whose chunks all fail to embed, or a rejected upsert skips that
    /// document; a failed embedding drops that
    /// chunk. Only failing to establish the target collection aborts the run.
    pub async fn ingest(&self, documents: Vec<Document>) -> AppResult<IngestReport> {
        let mut report = IngestReport::start();
        let _timer = Stopwatch::start("ingest");

        if documents.is_empty() {
            report.finished_at = Utc::now();
            return Ok(report);
        }

        let dimensions = match self.settings.dimensions {
            Some(dimensions) => dimensions,
            None => self.gateway.probe_dimensions().await?,
        };
        let mut collection = self
            .manager
            .ensure_or_migrate(dimensions, self.settings.distance)
            .await?;

        let chunking = &self.settings.chunking;
        for document in documents {
            if document.text.trim().is_empty() {
                warn!("Skipping '{}': no readable text", document.name);
                report.documents_skipped += 1;
                continue;
            }

            let _doc_timer = Stopwatch::start(format!("ingest '{}'", document.name));
            let windows = chunk_text(
                &document.text,
                chunking.max_tokens,
                chunking.overlap_tokens,
                chunking.min_chunk_chars,
            );
            let chunks = build_chunks(&document.name, windows);
            if chunks.is_empty() {
                warn!(
                    "Skipping '{}': no chunk reaches {} characters",
                    document.name, chunking.min_chunk_chars
                );
                report.documents_skipped += 1;
                continue;
            }

            let batch = self.gateway.embed_chunks(chunks, dimensions).await;
            report.chunks_dropped += batch.dropped;

            // Identical windows share an id; keep the first
            let mut seen = HashSet::new();
            let mut ids = Vec::new();
            let mut vectors = Vec::new();
            let mut payloads = Vec::new();
            for (chunk, vector) in batch.embedded {
                if seen.insert(chunk.id.clone()) {
                    payloads.push(chunk.payload());
                    ids.push(chunk.id);
                    vectors.push(vector);
                }
            }
            if ids.is_empty() {
                warn!(
                    "Skipping '{}': none of its {} chunk(s) could be embedded",
                    document.name, batch.dropped
                );
                report.documents_skipped += 1;
                continue;
            }
            let upserted = ids.len();

            match self
                .manager
                .upsert_parts(&collection, ids, vectors, payloads)
                .await
            {
                Ok(written) => {
                    collection = written;
                    report.documents_processed += 1;
                    report.chunks_upserted += upserted;
                    info!(
                        "Ingested '{}': {} chunk(s) upserted, {} dropped",
                        document.name, upserted, batch.dropped
                    );
                }
                Err(e) => {
                    warn!("Skipping '{}': {}", document.name, e);
                    report.documents_skipped += 1;
                }
            }
        }

        report.collection = Some(collection.name);
        report.finished_at = Utc::now();
        info!(
            "Ingestion finished: {} document(s) processed, {} skipped, {} chunk(s) upserted, {} dropped",
            report.documents_processed,
            report.documents_skipped,
            report.chunks_upserted,
            report.chunks_dropped
        );
        Ok(report)
    }

    pub async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<Hit>> {
        self.retriever.retrieve(query, top_k).await
    }

    /// Answer with the configured `top_k`.
    pub async fn answer(&self, query: &str) -> AppResult<Answer> {
        self.answer_with(query, self.settings.retrieval.top_k).await
    }

    pub async fn answer_with(&self, query: &str, top_k: usize) -> AppResult<Answer> {
        if let Some(answer) = self.cache.get(query, top_k) {
            info!("Answer served from cache");
            return Ok(answer.cached());
        }

        let hits = self.retriever.retrieve(query, top_k).await?;
        if hits.is_empty() {
            info!("No hits; answering without generation");
            return Ok(Answer::no_information(query));
        }

        let context = build_context(&hits, self.settings.retrieval.max_context_chars);
        let prompt = render_answer_prompt(&self.prompt, query, &context)?;

        let text = self
            .generator
            .generate(prompt.system.as_deref(), &prompt.user)
            .await?;

        let answer = Answer::new(text, map_hits_to_sources(&hits));
        self.cache.set(query, top_k, answer.clone());
        Ok(answer)
    }

    /// Stream with the configured `top_k`.
    pub async fn answer_stream(&self, query: &str) -> StreamingAnswer {
        self.answer_stream_with(query, self.settings.retrieval.top_k)
            .await
    }

    /// Stream an answer. Failures before or during generation arrive in-band
    /// as one `ErrorDelta`; every event stream starts with `Start` and ends
    /// with `Done`. A stream that completes without error is cached.
    pub async fn answer_stream_with(&self, query: &str, top_k: usize) -> StreamingAnswer {
        if let Some(answer) = self.cache.get(query, top_k) {
            info!("Answer served from cache");
            return StreamingAnswer {
                sources: answer.sources,
                from_cache: true,
                events: complete_event_stream(answer.text),
            };
        }

        let failed = |message: String| StreamingAnswer {
            sources: Vec::new(),
            from_cache: false,
            events: error_event_stream(message),
        };

        let hits = match self.retriever.retrieve(query, top_k).await {
            Ok(hits) => hits,
            Err(e) => return failed(e.to_string()),
        };
        if hits.is_empty() {
            return StreamingAnswer {
                sources: Vec::new(),
                from_cache: false,
                events: complete_event_stream(Answer::no_information(query).text),
            };
        }

        let context = build_context(&hits, self.settings.retrieval.max_context_chars);
        let prompt = match render_answer_prompt(&self.prompt, query, &context) {
            Ok(prompt) => prompt,
            Err(e) => return failed(e.to_string()),
        };

        let sources = map_hits_to_sources(&hits);
        let events = match self
            .generator
            .generate_stream(prompt.system.as_deref(), &prompt.user)
            .await
        {
            Ok(events) => events,
            Err(e) => return failed(e.to_string()),
        };

        StreamingAnswer {
            events: cache_on_completion(
                events,
                self.cache.clone(),
                query.to_string(),
                top_k,
                sources.clone(),
            ),
            sources,
            from_cache: false,
        }
    }

    /// The collection queries resolve to for the current embedding model.
    pub async fn active_collection(&self) -> AppResult<Option<Collection>> {
        let dimensions = match self.settings.dimensions {
            Some(dimensions) => dimensions,
            None => self.gateway.probe_dimensions().await?,
        };
        self.manager.resolve(dimensions, self.settings.distance).await
    }

    pub async fn stats(&self) -> AppResult<Vec<CollectionStats>> {
        self.manager.stats().await
    }

    pub async fn drop_collection(&self, name: &str) -> AppResult<bool> {
        self.manager.drop_collection(name).await
    }
}

/// `Start`, the whole text as one delta, `Done`.
fn complete_event_stream(text: String) -> EventStream {
    Box::pin(futures::stream::iter(vec![
        GenerationEvent::Start,
        GenerationEvent::ContentDelta(text),
        GenerationEvent::Done,
    ]))
}

/// Pass events through, storing the accumulated text once `Done` arrives
/// unless an `ErrorDelta` was seen.
fn cache_on_completion(
    events: EventStream,
    cache: Arc<ResponseCache>,
    query: String,
    top_k: usize,
    sources: Vec<SourceRef>,
) -> EventStream {
    let mut text = String::new();
    let mut errored = false;

    Box::pin(events.map(move |event| {
        match &event {
            GenerationEvent::ContentDelta(delta) => text.push_str(delta),
            GenerationEvent::ErrorDelta(_) => errored = true,
            GenerationEvent::Done if !errored => {
                cache.set(&query, top_k, Answer::new(std::mem::take(&mut text), sources.clone()));
            }
            _ => {}
        }
        event
    }))
}
