//! Prompt system for ragline.
//!
//! This crate provides prompt management with:
//! - A built-in grounded answering prompt
//! - YAML overrides under `.ragline/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, load_or_builtin, load_prompt, ANSWER_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
