//! Answer construction: prompt rendering and source references.

use std::collections::{HashMap, HashSet};

use ragline_core::AppResult;
use ragline_prompt::{build_prompt, BuiltPrompt, PromptDefinition};

use crate::rag::types::SourceRef;
use crate::types::Hit;

/// Maximum snippet length for source references, in characters.
pub const MAX_SNIPPET_CHARS: usize = 150;

/// Render the answer prompt for `query` over an assembled context.
pub fn render_answer_prompt(
    definition: &PromptDefinition,
    query: &str,
    context: &str,
) -> AppResult<BuiltPrompt> {
    let mut variables = HashMap::new();
    variables.insert("query".to_string(), query.to_string());
    variables.insert("context".to_string(), context.to_string());
    build_prompt(definition, variables)
}

/// Map ranked hits to source references, first occurrence per `(source, section)`.
pub fn map_hits_to_sources(hits: &[Hit]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for hit in hits {
        if seen.insert((hit.source.as_str(), hit.section.as_str())) {
            sources.push(SourceRef {
                source: hit.source.clone(),
                section: hit.section.clone(),
                score: hit.score,
                snippet: truncate_snippet(&hit.text, MAX_SNIPPET_CHARS),
            });
        }
    }

    sources
}

/// Cut `text` to `max_chars`, backing off to the last word boundary.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", truncated[..last_space].trim_end()),
        _ => format!("{}...", truncated),
    }
}
