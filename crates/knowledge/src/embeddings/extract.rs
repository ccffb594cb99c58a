//! Embedding response extraction.
//!
//! Backends disagree on where the vector lives in the response body. Each
//! strategy knows one shape; strategies are tried in a fixed order and the
//! first usable vector wins.

use ragline_core::{AppError, AppResult};
use serde_json::Value;

/// Characters of the response kept for diagnostics.
pub const SNIPPET_CHARS: usize = 200;

/// Result of one extraction strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Vector(Vec<f32>),
    NoMatch,
}

/// One response shape.
pub trait EmbeddingExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, response: &Value) -> Extraction;
}

/// `{"embedding": [...]}`
#[derive(Debug)]
pub struct DirectField;

/// `{"data": [{"embedding": [...]}]}`
#[derive(Debug)]
pub struct DataArray;

/// `{"embeddings": [[...]]}`
#[derive(Debug)]
pub struct EmbeddingsArray;

impl EmbeddingExtractor for DirectField {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn extract(&self, response: &Value) -> Extraction {
        to_extraction(response.get("embedding"))
    }
}

impl EmbeddingExtractor for DataArray {
    fn name(&self) -> &'static str {
        "data[0].embedding"
    }

    fn extract(&self, response: &Value) -> Extraction {
        to_extraction(
            response
                .get("data")
                .and_then(|d| d.get(0))
                .and_then(|first| first.get("embedding")),
        )
    }
}

impl EmbeddingExtractor for EmbeddingsArray {
    fn name(&self) -> &'static str {
        "embeddings[0]"
    }

    fn extract(&self, response: &Value) -> Extraction {
        to_extraction(response.get("embeddings").and_then(|e| e.get(0)))
    }
}

/// A non-empty array of finite numbers, or no match.
fn to_extraction(value: Option<&Value>) -> Extraction {
    let Some(items) = value.and_then(Value::as_array) else {
        return Extraction::NoMatch;
    };
    if items.is_empty() {
        return Extraction::NoMatch;
    }

    let mut vector = Vec::with_capacity(items.len());
    for item in items {
        match item.as_f64().map(|f| f as f32) {
            Some(f) if f.is_finite() => vector.push(f),
            _ => return Extraction::NoMatch,
        }
    }
    Extraction::Vector(vector)
}

/// Strategies in priority order.
pub fn default_extractors() -> Vec<Box<dyn EmbeddingExtractor>> {
    vec![
        Box::new(DirectField),
        Box::new(DataArray),
        Box::new(EmbeddingsArray),
    ]
}

/// Apply `extractors` in order and return the first vector.
pub fn extract_embedding(
    extractors: &[Box<dyn EmbeddingExtractor>],
    response: &Value,
) -> AppResult<Vec<f32>> {
    for extractor in extractors {
        if let Extraction::Vector(vector) = extractor.extract(response) {
            tracing::trace!("Embedding extracted via '{}'", extractor.name());
            return Ok(vector);
        }
    }

    Err(AppError::ExtractionFailed {
        snippet: response_snippet(response),
    })
}

/// The response rendered as JSON, cut to [`SNIPPET_CHARS`] characters.
pub fn response_snippet(response: &Value) -> String {
    let rendered = match response {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() <= SNIPPET_CHARS {
        rendered
    } else {
        let cut: String = rendered.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", cut)
    }
}
