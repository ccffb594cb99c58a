//! Error types for the ragline pipeline.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, generation, embedding, vector
//! store and prompt errors.

use thiserror::Error;

/// Unified error type for ragline.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation backend errors (transport, HTTP status, decoding)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge pipeline errors without a more specific kind
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// A source could not be read into text
    #[error("Load error: {0}")]
    Load(String),

    /// No extraction strategy recognized the embedding response
    #[error("Embedding extraction failed; response: {snippet}")]
    ExtractionFailed { snippet: String },

    /// Embedding still unavailable after provisioning and one retry
    #[error(
        "Embedding unavailable for model '{model}' (input length {input_len}); response: {snippet}"
    )]
    EmbeddingUnavailable {
        model: String,
        input_len: usize,
        snippet: String,
    },

    /// Vector length does not match the collection's declared dimensionality
    #[error("Dimension mismatch for collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// Vector store transport or protocol errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// The vector store rejected a batch
    #[error("Upsert into '{collection}' failed: {reason}")]
    Upsert { collection: String, reason: String },

    /// The generation backend does not know the requested model
    #[error("Model '{model}' not found. Available models: {}", format_models(available))]
    ModelNotFound {
        model: String,
        available: Vec<String>,
    },

    /// Blocking generation exhausted its retry schedule
    #[error("Generation failed after {attempts} attempt(s): {last_error}")]
    GenerationFailed { attempts: usize, last_error: String },

    /// Transport failure after a generation stream started
    #[error("Stream transport error: {0}")]
    StreamTransport(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

fn format_models(models: &[String]) -> String {
    if models.is_empty() {
        "(none)".to_string()
    } else {
        models.join(", ")
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
