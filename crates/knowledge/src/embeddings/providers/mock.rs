//! Mock embedding backend using trigram-based content-aware embeddings.

use crate::embeddings::EmbeddingBackend;
use ragline_core::AppResult;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

/// Model name reported by the mock backend.
pub const MOCK_MODEL: &str = "trigram-v1";

/// Mock backend for tests and offline runs.
///
/// Generates deterministic embeddings from character trigrams and word
/// frequencies. Not semantically accurate, but consistent and
/// content-dependent: texts sharing words land close together.
#[derive(Debug)]
pub struct MockBackend {
    dimensions: usize,
}

impl MockBackend {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Generate the embedding for `text`.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();

        let stop_words: HashSet<&str> = [
            "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to",
            "of", "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have",
            "has", "had", "it", "its", "their", "they", "them",
        ]
        .iter()
        .copied()
        .collect();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !stop_words.contains(w) && w.chars().count() > 2)
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in word_freq.iter() {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let trigram_hash = trigram
                    .bytes()
                    .fold(0u64, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));

                let dim_idx = (trigram_hash as usize) % self.dimensions;
                embedding[dim_idx] += (*freq as f32).sqrt();
            }

            // Also encode whole word
            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            let base_dim = (word_hash as usize) % self.dimensions;
            embedding[base_dim] += *freq as f32;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingBackend for MockBackend {
    fn backend_name(&self) -> &str {
        "mock"
    }

    async fn request_embedding(&self, _model: &str, text: &str) -> AppResult<Value> {
        Ok(json!({ "embedding": self.embed_text(text) }))
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        Ok(vec![MOCK_MODEL.to_string()])
    }

    async fn pull_model(&self, _model: &str) -> AppResult<()> {
        Ok(())
    }
}
