//! Ollama embedding backend.
//!
//! Sends `{model, prompt, input}` so both the legacy `/api/embeddings` and the
//! newer `/api/embed` endpoints accept the request.

use std::time::Duration;

use async_trait::async_trait;
use ragline_core::{AppError, AppResult};
use ragline_llm::providers::ollama::{fetch_model_names, pull_model};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::embeddings::EmbeddingBackend;

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    input: &'a str,
}

/// Ollama embedding backend using the local API.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_path: String,
    pull_timeout: Duration,
}

impl OllamaBackend {
    pub fn new(
        base_url: &str,
        embed_path: &str,
        timeout: Duration,
        pull_timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Llm(format!("Failed to create HTTP client for Ollama: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_path: format!("/{}", embed_path.trim_start_matches('/')),
            pull_timeout,
        })
    }

    fn embed_url(&self) -> String {
        format!("{}{}", self.base_url, self.embed_path)
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn backend_name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %model))]
    async fn request_embedding(&self, model: &str, text: &str) -> AppResult<Value> {
        let url = self.embed_url();
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model,
                prompt: text,
                input: text,
            })
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read Ollama response: {}", e)))?;

        if !status.is_success() {
            debug!("Embedding endpoint answered {}: {}", status, body);
        }

        // Error bodies are returned as-is so the caller can report them.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        fetch_model_names(&self.client, &self.base_url, Duration::from_secs(10)).await
    }

    #[instrument(skip(self))]
    async fn pull_model(&self, model: &str) -> AppResult<()> {
        pull_model(&self.client, &self.base_url, model, self.pull_timeout).await
    }
}
