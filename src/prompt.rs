//! Prompt construction for docstring generation.

use std::path::Path;

use crate::error::{DocstringerError, Result};
use crate::extract::syntax::NodeId;
use crate::extract::FunctionCandidate;

/// Placeholder replaced by the function's full source
pub const SOURCE_PLACEHOLDER: &str = "{function_source}";

/// Built-in prompt template
pub const DEFAULT_PROMPT: &str = r#"Write a Python docstring for the function below, in Google style.

Include:
- a one-line summary of what the function does
- an Args section listing every parameter with its name and inferred type
- a Returns section describing the return value and its type (omit it if the function returns nothing)
- a short Example section, only when a usage example is genuinely illustrative

Reply with the docstring text only. Do not include the surrounding triple quotes, the function signature, code fences, or any commentary.

Function:
{function_source}
"#;

/// A generation request for one candidate
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub candidate_id: NodeId,
    pub function_name: String,
    pub prompt: String,
}

/// Turns candidates into generation requests. Pure: no I/O after construction.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load the template from `prompt_file` if given, else use the built-in one
    pub fn from_file(prompt_file: Option<&Path>) -> Result<Self> {
        match prompt_file {
            Some(path) => {
                let template = std::fs::read_to_string(path).map_err(|e| {
                    DocstringerError::Config(format!(
                        "Failed to read prompt file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Self::new(template))
            }
            None => Ok(Self::default()),
        }
    }

    /// Build the request for a candidate.
    ///
    /// A template without the placeholder gets the source appended.
    pub fn build(&self, candidate: &FunctionCandidate) -> GenerationRequest {
        let prompt = if self.template.contains(SOURCE_PLACEHOLDER) {
            self.template.replace(SOURCE_PLACEHOLDER, &candidate.source)
        } else {
            format!("{}\n{}", self.template.trim_end(), candidate.source)
        };

        GenerationRequest {
            candidate_id: candidate.id,
            function_name: candidate.qualified_name.clone(),
            prompt,
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_candidates;
    use tempfile::TempDir;

    const CODE: &str = "def square(x):\n    return x ** 2\n";

    #[test]
    fn test_prompt_contains_full_source_and_instructions() {
        let candidate = &extract_candidates(CODE).unwrap()[0];
        let request = PromptBuilder::default().build(candidate);

        assert_eq!(request.function_name, "square");
        assert_eq!(request.candidate_id, candidate.id);
        assert!(request.prompt.contains("def square(x):\n    return x ** 2"));
        assert!(request.prompt.contains("Args"));
        assert!(request.prompt.contains("Returns"));
        assert!(request.prompt.contains("docstring text only"));
        assert!(!request.prompt.contains(SOURCE_PLACEHOLDER));
    }

    #[test]
    fn test_build_is_deterministic() {
        let candidate = &extract_candidates(CODE).unwrap()[0];
        let builder = PromptBuilder::default();
        assert_eq!(builder.build(candidate).prompt, builder.build(candidate).prompt);
    }

    #[test]
    fn test_template_without_placeholder_appends_source() {
        let candidate = &extract_candidates(CODE).unwrap()[0];
        let request = PromptBuilder::new("Document this:\n\n").build(candidate);
        assert_eq!(request.prompt, format!("Document this:\n{}", candidate.source));
    }

    #[test]
    fn test_prompt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prompt.txt");
        std::fs::write(&path, "Custom: {function_source}").unwrap();

        let builder = PromptBuilder::from_file(Some(&path)).unwrap();
        let candidate = &extract_candidates(CODE).unwrap()[0];
        assert!(builder.build(candidate).prompt.starts_with("Custom: def square"));

        let missing = PromptBuilder::from_file(Some(&temp_dir.path().join("nope.txt")));
        assert!(matches!(missing, Err(DocstringerError::Config(_))));
    }
}
