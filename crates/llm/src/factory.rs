//! LLM provider factory.
//!
//! Builds clients and generators from application configuration.

use std::sync::Arc;
use std::time::Duration;

use ragline_core::{AppConfig, AppError, AppResult};

use crate::client::LlmClient;
use crate::generator::Generator;
use crate::providers::OllamaClient;
use crate::retry::RetryPolicy;
use crate::types::GenerationOptions;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier (currently only "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `connect_timeout` - Bound on establishing a connection
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    connect_timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            let client = OllamaClient::with_connect_timeout(base_url, connect_timeout)?;
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

/// Build the generator described by `config`.
pub fn create_generator(config: &AppConfig) -> AppResult<Generator> {
    let client = create_client(
        "ollama",
        Some(&config.ollama.endpoint),
        Duration::from_secs(config.generation.connect_timeout_secs),
    )?;

    Ok(Generator::new(
        client,
        GenerationOptions::from_config(config),
        RetryPolicy::new(config.generation.retry_timeouts()),
    ))
}
