//! Generation backend integration for ragline.
//!
//! This crate provides a provider-agnostic abstraction over generation
//! backends, plus the [`Generator`] that adds escalating-timeout retries and
//! bracketed event streams on top of it.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use ragline_llm::{GenerationEvent, Generator};
//! use futures::StreamExt;
//!
//! # async fn example(generator: Generator) -> ragline_core::AppResult<()> {
//! let mut events = generator.generate_stream(None, "Hello").await?;
//! while let Some(event) = events.next().await {
//!     if let GenerationEvent::ContentDelta(text) = event {
//!         print!("{}", text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod generator;
pub mod ndjson;
pub mod providers;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmOptions, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::{create_client, create_generator};
pub use generator::{bracket_events, Generator};
pub use providers::OllamaClient;
pub use retry::{RetryPolicy, RetryState};
pub use types::{error_event_stream, EventStream, GenerationEvent, GenerationOptions};
