//! Embedding backend trait and factory.

use ragline_core::{AppConfig, AppError, AppResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::providers::{mock::MockBackend, ollama::OllamaBackend};

/// Trait for embedding backends.
///
/// Backends return the raw JSON body; interpreting its shape is the
/// gateway's job, since different servers nest the vector differently.
#[async_trait::async_trait]
pub trait EmbeddingBackend: Send + Sync + std::fmt::Debug {
    /// Get backend name (e.g., "mock", "ollama")
    fn backend_name(&self) -> &str;

    /// Request an embedding of `text` and return the response body.
    ///
    /// Transport failures are errors; an unexpected body is not.
    async fn request_embedding(&self, model: &str, text: &str) -> AppResult<Value>;

    /// Names of the models the backend has installed.
    async fn list_models(&self) -> AppResult<Vec<String>>;

    /// Ask the backend to provision `model`.
    async fn pull_model(&self, model: &str) -> AppResult<()>;
}

/// Create an embedding backend based on configuration.
pub fn create_backend(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingBackend>> {
    match config.embedding.provider.as_str() {
        "mock" => {
            let dimensions = config.embedding.dimensions.unwrap_or(384);
            Ok(Arc::new(MockBackend::new(dimensions)))
        }

        "ollama" => {
            let backend = OllamaBackend::new(
                &config.ollama.endpoint,
                &config.ollama.embed_path,
                Duration::from_secs(config.embedding.timeout_secs),
                Duration::from_secs(config.embedding.pull_timeout_secs),
            )?;
            Ok(Arc::new(backend))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, ollama",
            config.embedding.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_backend() {
        let mut config = AppConfig::default();
        config.embedding.provider = "mock".to_string();

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.backend_name(), "mock");
    }

    #[test]
    fn test_create_ollama_backend() {
        let backend = create_backend(&AppConfig::default()).unwrap();
        assert_eq!(backend.backend_name(), "ollama");
    }

    #[test]
    fn test_create_unknown_backend() {
        let mut config = AppConfig::default();
        config.embedding.provider = "unknown".to_string();

        let result = create_backend(&config);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }
}
