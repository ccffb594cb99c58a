//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use ragline_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the system and user templates are rendered with the same variables.
///
/// # Example
/// ```no_run
/// use ragline_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "What is Rust?".to_string());
/// vars.insert("context".to_string(), "Rust is a language.".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let user = render_template(&definition.template, &variables)?;
    let system = match &definition.system {
        Some(template) => Some(render_template(template, &variables)?),
        None => None,
    };

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Context is plain text; HTML escaping would mangle it
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::builtin_prompt;

    fn vars(query: &str, context: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{query}}", &vars("Hello, world!", ""));
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let result = render_template("{{context}}", &vars("", "a < b && \"c\""));
        assert_eq!(result.unwrap(), "a < b && \"c\"");
    }

    #[test]
    fn test_build_answer_prompt() {
        let def = builtin_prompt("answer").unwrap();
        let built = build_prompt(&def, vars("What is X?", "notes.md (1/2)\nX is Y.\n")).unwrap();

        assert!(built.user.contains("Question: What is X?"));
        assert!(built.user.contains("X is Y."));
        assert!(built.system.is_some());
        assert_eq!(built.metadata.source_prompt_id, "answer");
    }

    #[test]
    fn test_invalid_template() {
        let def = PromptDefinition {
            id: "broken".to_string(),
            title: String::new(),
            system: None,
            template: "{{#if query}}unclosed".to_string(),
        };
        assert!(matches!(
            build_prompt(&def, vars("q", "c")),
            Err(AppError::Prompt(_))
        ));
    }
}
