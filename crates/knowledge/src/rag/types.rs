//! Answer types.

use serde::{Deserialize, Serialize};

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source document name (e.g., "faq.md")
    pub source: String,

    /// Chunk location within the source, `"<i>/<n>"`
    pub section: String,

    /// Similarity score of the hit
    pub score: f32,

    /// Short excerpt of the hit text
    pub snippet: String,
}

/// A generated answer with its sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    /// Whether this answer was served by the response cache
    #[serde(default)]
    pub from_cache: bool,
}

impl Answer {
    pub fn new(text: String, sources: Vec<SourceRef>) -> Self {
        Self {
            text,
            sources,
            from_cache: false,
        }
    }

    /// Fixed answer when retrieval finds nothing.
    pub fn no_information(query: &str) -> Self {
        Self::new(
            format!(
                "I could not find information about \"{}\" in the available documents.",
                query
            ),
            Vec::new(),
        )
    }

    pub(crate) fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_information_answer() {
        let answer = Answer::no_information("warp drives");

        assert_eq!(
            answer.text,
            "I could not find information about \"warp drives\" in the available documents."
        );
        assert!(answer.sources.is_empty());
        assert!(!answer.from_cache);
    }

    #[test]
    fn test_answer_serialization() {
        let answer = Answer::new(
            "Rust has no GC.".to_string(),
            vec![SourceRef {
                source: "faq.md".to_string(),
                section: "1/3".to_string(),
                score: 0.8,
                snippet: "Rust has no garbage collector".to_string(),
            }],
        );

        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["sources"][0]["section"], "1/3");
        assert_eq!(json["from_cache"], false);
    }
}
