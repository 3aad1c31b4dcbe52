pub mod normalize;
pub mod openai;

use async_trait::async_trait;

use crate::error::Result;
use crate::extract::FunctionCandidate;
use crate::prompt::GenerationRequest;

pub use normalize::normalize_docstring;
pub use openai::OpenAIGenerator;

/// Raw text returned by a generation service
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    /// Prompt + completion tokens reported by the service
    pub total_tokens: u64,
}

/// A normalized docstring ready to be spliced into a file
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub raw: String,
    pub docstring: String,
    pub total_tokens: u64,
}

/// Text generation collaborator
///
/// Implementations must enforce their own per-request timeout and report
/// failures as generation errors so the caller can skip the candidate.
#[async_trait]
pub trait DocstringGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generated>;
}

/// Generate and normalize the docstring for one candidate
pub async fn generate_docstring<G>(
    generator: &G,
    request: &GenerationRequest,
    candidate: &FunctionCandidate,
) -> Result<GenerationResult>
where
    G: DocstringGenerator + ?Sized,
{
    let generated = generator.generate(request).await?;
    log::debug!("Raw response for {}: {}", request.function_name, generated.text);

    let docstring = normalize_docstring(
        &generated.text,
        &candidate.body_indent,
        candidate.line_ending,
    )?;

    Ok(GenerationResult {
        raw: generated.text,
        docstring,
        total_tokens: generated.total_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocstringerError;
    use crate::extract::extract_candidates;
    use crate::prompt::PromptBuilder;

    struct Fixed(&'static str);

    #[async_trait]
    impl DocstringGenerator for Fixed {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Generated> {
            Ok(Generated {
                text: self.0.to_string(),
                total_tokens: 42,
            })
        }
    }

    #[tokio::test]
    async fn test_generate_docstring_uses_candidate_indent() {
        let code = "class A:\n    def m(self):\n        return 1\n";
        let candidate = &extract_candidates(code).unwrap()[0];
        let request = PromptBuilder::default().build(candidate);

        let result = generate_docstring(&Fixed("Return one."), &request, candidate)
            .await
            .unwrap();
        assert_eq!(result.docstring, "        \"\"\"Return one.\"\"\"\n");
        assert_eq!(result.total_tokens, 42);
        assert_eq!(result.raw, "Return one.");
    }

    #[tokio::test]
    async fn test_generate_docstring_empty_is_format_error() {
        let code = "def f():\n    return 1\n";
        let candidate = &extract_candidates(code).unwrap()[0];
        let request = PromptBuilder::default().build(candidate);

        let err = generate_docstring(&Fixed("   "), &request, candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, DocstringerError::GenerationFormat(_)));
    }
}
