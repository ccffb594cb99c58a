//! Generation event types.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use ragline_core::config::{AppConfig, GenerationSettings};

/// Model and sampling parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub context_window: u32,
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    pub fn from_settings(model: impl Into<String>, settings: &GenerationSettings) -> Self {
        Self {
            model: model.into(),
            temperature: settings.temperature,
            context_window: settings.context_window,
            max_output_tokens: settings.max_output_tokens,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_settings(config.ollama.generation_model.clone(), &config.generation)
    }
}

/// One event of a streamed answer.
///
/// Every stream opens with `Start` and closes with exactly one `Done`.
/// Failures after `Start` arrive in-band as a single `ErrorDelta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum GenerationEvent {
    Start,
    ContentDelta(String),
    ErrorDelta(String),
    Done,
}

/// Stream of generation events.
pub type EventStream = Pin<Box<dyn Stream<Item = GenerationEvent> + Send>>;

/// A complete bracketed stream reporting `message` as its only content.
pub fn error_event_stream(message: impl Into<String>) -> EventStream {
    Box::pin(futures::stream::iter(vec![
        GenerationEvent::Start,
        GenerationEvent::ErrorDelta(message.into()),
        GenerationEvent::Done,
    ]))
}
