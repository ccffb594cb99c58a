//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use ragline_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Identifier of the grounded answering prompt.
pub const ANSWER_PROMPT_ID: &str = "answer";

const ANSWER_SYSTEM: &str = "You are a documentation assistant. Answer only from the provided \
context. If the context does not contain the answer, say that you do not know. \
End with the list of sources you used.";

const ANSWER_TEMPLATE: &str = "Question: {{query}}

Context (use only this information):
{{context}}

Answer briefly and precisely. List the sources at the end in the form: Source: <file> (<section>).";

/// The built-in definition for `id`, if one exists.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        ANSWER_PROMPT_ID => Some(PromptDefinition {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Grounded answer".to_string(),
            system: Some(ANSWER_SYSTEM.to_string()),
            template: ANSWER_TEMPLATE.to_string(),
        }),
        _ => None,
    }
}

fn prompt_file(prompts_dir: &Path, prompt_id: &str) -> Option<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| prompts_dir.join(format!("{}.{}", prompt_id, ext)))
        .find(|path| path.exists())
}

/// Load a prompt definition by ID from `prompts_dir`.
///
/// Looks for `<id>.yaml`, then `<id>.yml`.
///
/// # Example
/// ```no_run
/// use ragline_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".ragline/prompts"), "answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let path = prompt_file(prompts_dir, prompt_id).ok_or_else(|| {
        AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompts_dir.join(format!("{}.yaml", prompt_id))
        ))
    })?;

    tracing::debug!("Loading prompt from: {:?}", path);

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e)))?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} from {:?}", definition.id, path);
    Ok(definition)
}

/// Load the workspace override for `prompt_id`, or fall back to the built-in one.
///
/// A present but invalid override is an error, not a silent fallback.
pub fn load_or_builtin(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    if prompt_file(prompts_dir, prompt_id).is_some() {
        return load_prompt(prompts_dir, prompt_id);
    }

    builtin_prompt(prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt("Prompt template cannot be empty".to_string()));
    }

    Ok(())
}
