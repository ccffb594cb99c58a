//! Configuration management for ragline.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - Config file (`.ragline/config.yaml` in the workspace, or `RAGLINE_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)
//!
//! The configuration is workspace-centric, with local state stored in `.ragline/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Distance metric used by a vector collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl DistanceMetric {
    /// Parse a metric name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(Self::Cosine),
            "dot" => Some(Self::Dot),
            "euclid" | "euclidean" => Some(Self::Euclid),
            "manhattan" => Some(Self::Manhattan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclid => "euclid",
            Self::Manhattan => "manhattan",
        }
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Cosine
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragline/)
    #[serde(skip)]
    pub workspace: PathBuf,

    /// Optional config file path
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    #[serde(default)]
    pub ollama: OllamaSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Ollama endpoint and model names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub endpoint: String,
    pub generation_model: String,
    pub embedding_model: String,
    /// Path of the embedding endpoint (`/api/embeddings` or `/api/embed`)
    pub embed_path: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            generation_model: "llama3.2".to_string(),
            embedding_model: "bge-m3".to_string(),
            embed_path: "/api/embeddings".to_string(),
        }
    }
}

/// Embedding gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// "ollama" or "mock"
    pub provider: String,

    /// Declared dimensionality; probed from the backend when absent
    pub dimensions: Option<usize>,

    /// Chunks per ingestion batch
    pub batch_size: usize,

    /// Concurrent embedding requests within a batch
    pub concurrency: usize,

    pub timeout_secs: u64,

    /// Timeout for a model provisioning (pull) call
    pub pull_timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            dimensions: None,
            batch_size: 12,
            concurrency: 4,
            timeout_secs: 60,
            pull_timeout_secs: 600,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// "qdrant" or "memory"
    pub provider: String,
    pub url: String,
    /// Base collection name; migrated collections derive from it
    pub collection: String,
    pub distance: DistanceMetric,
    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "qdrant".to_string(),
            url: "http://localhost:6333".to_string(),
            collection: "docs".to_string(),
            distance: DistanceMetric::Cosine,
            timeout_secs: 30,
        }
    }
}

/// Chunker settings. Token counts use the 4-characters-per-token heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_tokens: 350,
            overlap_tokens: 40,
            min_chunk_chars: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Context budget in characters
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 6000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub context_window: u32,
    pub max_output_tokens: u32,
    /// Per-attempt timeouts; the schedule length bounds the attempt count
    pub retry_timeouts_secs: Vec<u64>,
    pub connect_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            context_window: 3072,
            max_output_tokens: 512,
            retry_timeouts_secs: vec![60, 120, 240],
            connect_timeout_secs: 10,
        }
    }
}

impl GenerationSettings {
    pub fn retry_timeouts(&self) -> Vec<Duration> {
        self.retry_timeouts_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 600 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub color: Option<bool>,
    pub format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            ollama: OllamaSettings::default(),
            embedding: EmbeddingSettings::default(),
            vector_store: VectorStoreSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `RAGLINE_WORKSPACE`: Override workspace path
    /// - `RAGLINE_CONFIG`: Path to config file
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RAGLINE_MODEL`: Generation model
    /// - `RAGLINE_EMBED_MODEL`: Embedding model
    /// - `RAGLINE_EMBED_DIM`: Declared embedding dimensionality
    /// - `QDRANT_URL`: Vector store endpoint
    /// - `RAGLINE_COLLECTION`: Base collection name
    /// - `RAGLINE_TOP_K`: Default number of hits
    /// - `RAGLINE_CACHE_TTL`: Response cache TTL in seconds
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragline_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`Self::load`], with an explicit workspace and config file taking
    /// precedence over `RAGLINE_WORKSPACE` and `RAGLINE_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var("RAGLINE_WORKSPACE").ok().map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("RAGLINE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.ragline_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env();

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    ///
    /// Workspace and config file path are kept from `self`.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut parsed: AppConfig = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        parsed.workspace = self.workspace.clone();
        parsed.config_file = Some(path.to_path_buf());

        tracing::debug!("Merged config file {:?}", path);
        Ok(parsed)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.ollama.endpoint = url;
        }
        if let Ok(model) = std::env::var("RAGLINE_MODEL") {
            self.ollama.generation_model = model;
        }
        if let Ok(model) = std::env::var("RAGLINE_EMBED_MODEL") {
            self.ollama.embedding_model = model;
        }
        if let Some(dim) = env_parse::<usize>("RAGLINE_EMBED_DIM") {
            self.embedding.dimensions = Some(dim);
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Ok(collection) = std::env::var("RAGLINE_COLLECTION") {
            self.vector_store.collection = collection;
        }
        if let Some(top_k) = env_parse::<usize>("RAGLINE_TOP_K") {
            self.retrieval.top_k = top_k;
        }
        if let Some(ttl) = env_parse::<u64>("RAGLINE_CACHE_TTL") {
            self.cache.ttl_secs = ttl;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.logging.color = Some(false);
        }
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        model: Option<String>,
        collection: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(model) = model {
            self.ollama.generation_model = model;
        }

        if let Some(collection) = collection {
            self.vector_store.collection = collection;
        }

        if let Some(log_level) = log_level {
            self.logging.level = Some(log_level);
        }

        if verbose && self.logging.level.is_none() {
            // Verbose mode implies debug logging
            self.logging.level = Some("debug".to_string());
        }

        if no_color {
            self.logging.color = Some(false);
        }

        self
    }

    /// Get the path to the .ragline directory.
    pub fn ragline_dir(&self) -> PathBuf {
        self.workspace.join(".ragline")
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.ragline_dir().join("prompts")
    }

    pub fn no_color(&self) -> bool {
        self.logging.color == Some(false)
    }

    /// Validate settings that would otherwise fail deep inside the pipeline.
    pub fn validate(&self) -> AppResult<()> {
        let embedding_providers = ["ollama", "mock"];
        if !embedding_providers.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                embedding_providers.join(", ")
            )));
        }

        let store_providers = ["qdrant", "memory"];
        if !store_providers.contains(&self.vector_store.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown vector store provider: {}. Supported: {}",
                self.vector_store.provider,
                store_providers.join(", ")
            )));
        }

        if self.vector_store.collection.trim().is_empty() {
            return Err(AppError::Config("Collection name must not be empty".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.concurrency == 0 {
            return Err(AppError::Config(
                "embedding.concurrency must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == Some(0) {
            return Err(AppError::Config(
                "embedding.dimensions must be positive when set".to_string(),
            ));
        }
        if self.generation.retry_timeouts_secs.is_empty() {
            return Err(AppError::Config(
                "generation.retry_timeouts_secs needs at least one entry".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(AppError::Config("cache.ttl_secs must be positive".to_string()));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable value for {}: {:?}", name, raw);
            None
        }
    }
}
