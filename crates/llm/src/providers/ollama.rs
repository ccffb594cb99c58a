//! Ollama LLM provider implementation.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use std::time::Duration;

use crate::client::{LlmClient, LlmOptions, LlmRequest, LlmResponse, LlmStream, LlmUsage};
use crate::ndjson::{decode_ndjson, ByteStream};
use futures::StreamExt;
use ragline_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    options: LlmOptions,
    stream: bool,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Ollama LLM client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose connections give up after `connect_timeout`.
    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(base_url.into()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_ollama_request(&self, request: &LlmRequest, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            options: request.options.clone(),
            stream,
        }
    }

    fn convert_response(&self, response: OllamaResponse) -> LlmResponse {
        let usage = LlmUsage::new(
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        );

        LlmResponse {
            content: response.response,
            model: response.model,
            usage,
            done: response.done,
        }
    }

    /// Turn a non-success response into an error, recognizing unknown models.
    async fn error_for_status(model: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == reqwest::StatusCode::NOT_FOUND && error_text.contains("not found") {
            return AppError::ModelNotFound {
                model: model.to_string(),
                available: Vec::new(),
            };
        }

        AppError::Llm(format!("Ollama API error ({}): {}", status, error_text))
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// True when `installed` names `wanted`, treating a missing tag as `latest`.
pub fn model_matches(installed: &str, wanted: &str) -> bool {
    fn with_tag(name: &str) -> String {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{}:latest", name)
        }
    }
    with_tag(installed) == with_tag(wanted)
}

/// List installed model names via `/api/tags`.
pub async fn fetch_model_names(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> AppResult<Vec<String>> {
    let url = format!("{}/api/tags", base_url);
    let response = client
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AppError::Llm(format!("Failed to list Ollama models: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Llm(format!(
            "Ollama model listing failed ({})",
            response.status()
        )));
    }

    let tags: TagsResponse = response
        .json()
        .await
        .map_err(|e| AppError::Llm(format!("Failed to parse model listing: {}", e)))?;

    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

/// Ask the backend to download `model` via `/api/pull`, waiting for completion.
pub async fn pull_model(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    timeout: Duration,
) -> AppResult<()> {
    let url = format!("{}/api/pull", base_url);
    tracing::info!("Pulling model '{}' from {}", model, base_url);

    let response = client
        .post(&url)
        .timeout(timeout)
        .json(&serde_json::json!({ "name": model, "stream": false }))
        .send()
        .await
        .map_err(|e| AppError::Llm(format!("Failed to pull model '{}': {}", model, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Llm(format!(
            "Pulling model '{}' failed ({}): {}",
            model, status, body
        )));
    }

    Ok(())
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!("Sending completion request to Ollama");

        let ollama_request = self.to_ollama_request(request, false);
        let url = format!("{}/api/generate", self.base_url);

        let mut builder = self.client.post(&url).json(&ollama_request);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(&request.model, response).await);
        }

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::debug!("Received completion from Ollama");
        Ok(self.convert_response(ollama_response))
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!("Starting streaming request to Ollama");

        let ollama_request = self.to_ollama_request(request, true);
        let url = format!("{}/api/generate", self.base_url);

        // Only connection setup is bounded; the body has no overall deadline.
        let send = self.client.post(&url).json(&ollama_request).send();
        let sent = match request.timeout {
            Some(timeout) => tokio::time::timeout(timeout, send).await.map_err(|_| {
                AppError::Llm(format!("Streaming request timed out after {:?}", timeout))
            })?,
            None => send.await,
        };
        let response = sent
            .map_err(|e| AppError::Llm(format!("Failed to send streaming request: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(&request.model, response).await);
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| AppError::StreamTransport(format!("Stream error: {}", e)))
        }));

        Ok(decode_ndjson(bytes))
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        fetch_model_names(&self.client, &self.base_url, Duration::from_secs(10)).await
    }
}
