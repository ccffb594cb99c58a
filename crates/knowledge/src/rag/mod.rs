//! Retrieval-augmented answering: context assembly, prompts and sources.

pub mod answer;
pub mod context;
pub mod types;

pub use answer::{map_hits_to_sources, render_answer_prompt};
pub use context::build_context;
pub use types::{Answer, SourceRef};
