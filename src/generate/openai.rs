use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DocstringGenerator, Generated};
use crate::config::GenerationConfig;
use crate::error::{DocstringerError, Result};
use crate::prompt::GenerationRequest;

/// Request structure for the OpenAI chat completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    n: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response structure from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u64,
}

/// Error body returned with non-2xx responses
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}

/// OpenAI chat completions client
///
/// Sends one prompt per request with a per-request timeout. Rate limits and
/// server errors are retried with exponential backoff; authentication and
/// billing failures are not.
pub struct OpenAIGenerator {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    max_retries: usize,
}

impl OpenAIGenerator {
    /// Create a new generator
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `config` - Model, endpoint, sampling and timeout settings
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        url::Url::parse(&endpoint).map_err(|e| {
            DocstringerError::Config(format!("Invalid generation endpoint {}: {}", endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocstringerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    /// Chat completions URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Make a single API request
    async fn request_once(&self, prompt: &str) -> Result<Generated> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            n: 1,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_error(status, &body));
        }

        let result: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                DocstringerError::GenerationTimeout(self.timeout_secs)
            } else {
                DocstringerError::GenerationService {
                    status: status.as_u16(),
                    message: format!("Failed to parse response: {}", e),
                }
            }
        })?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                DocstringerError::GenerationFormat("response contained no message".to_string())
            })?;

        Ok(Generated {
            text: text.trim().to_string(),
            total_tokens: result.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> DocstringerError {
        if e.is_timeout() {
            DocstringerError::GenerationTimeout(self.timeout_secs)
        } else {
            DocstringerError::GenerationService {
                status: 0,
                message: format!("Network error: {}", e),
            }
        }
    }
}

#[async_trait]
impl DocstringGenerator for OpenAIGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generated> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request_once(&request.prompt).await {
                Ok(generated) => {
                    log::debug!(
                        "Generation for {} took {:?} (attempt {}, {} tokens)",
                        request.function_name,
                        start.elapsed(),
                        attempt + 1,
                        generated.total_tokens
                    );
                    return Ok(generated);
                }
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    log::warn!(
                        "Retry {}/{} for {} after error: {}",
                        attempt + 1,
                        self.max_retries,
                        request.function_name,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a non-2xx response onto the generation error taxonomy
fn classify_error(status: StatusCode, body: &str) -> DocstringerError {
    let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(500).collect());

    let quota_exhausted = detail
        .as_ref()
        .map(|d| {
            d.code.as_deref() == Some("insufficient_quota")
                || d.kind.as_deref() == Some("insufficient_quota")
        })
        .unwrap_or(false);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
            DocstringerError::GenerationQuota(format!("{}: {}", status, message))
        }
        StatusCode::TOO_MANY_REQUESTS if quota_exhausted => {
            DocstringerError::GenerationQuota(format!("{}: {}", status, message))
        }
        _ => DocstringerError::GenerationService {
            status: status.as_u16(),
            message,
        },
    }
}

/// Rate limits, server errors and dropped connections are worth another try
fn is_retryable(error: &DocstringerError) -> bool {
    match error {
        DocstringerError::GenerationService { status, .. } => {
            *status == 0 || *status == 429 || *status >= 500
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request() -> GenerationRequest {
        GenerationRequest {
            candidate_id: 0,
            function_name: "square".to_string(),
            prompt: "Document: def square(x): ...".to_string(),
        }
    }

    /// Serve one canned HTTP response on a local port, returning the base URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            // Read headers and the full body before answering
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}/v1", addr)
    }

    fn generator(base_url: String, timeout_secs: u64) -> OpenAIGenerator {
        let config = GenerationConfig {
            base_url,
            timeout_secs,
            max_retries: 0,
            ..GenerationConfig::default()
        };
        OpenAIGenerator::new("test-key".to_string(), &config).unwrap()
    }

    #[test]
    fn test_endpoint_built_from_base_url() {
        let generator = generator("https://api.openai.com/v1/".to_string(), 20);
        assert_eq!(generator.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(generator.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_classify_errors() {
        let quota = classify_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#,
        );
        assert!(matches!(quota, DocstringerError::GenerationQuota(_)));

        let rate_limited = classify_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#,
        );
        assert!(matches!(rate_limited, DocstringerError::GenerationService { status: 429, .. }));
        assert!(is_retryable(&rate_limited));

        let auth = classify_error(StatusCode::UNAUTHORIZED, "not json");
        assert!(matches!(auth, DocstringerError::GenerationQuota(_)));
        assert!(!is_retryable(&auth));

        let server = classify_error(StatusCode::BAD_GATEWAY, "upstream down");
        match &server {
            DocstringerError::GenerationService { status, message } => {
                assert_eq!(*status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(is_retryable(&server));

        let bad_request = classify_error(StatusCode::BAD_REQUEST, "{}");
        assert!(!is_retryable(&bad_request));
    }

    #[tokio::test]
    async fn test_generate_success_reports_usage() {
        let base = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"  Square a number.\n"}}],"usage":{"prompt_tokens":30,"completion_tokens":5,"total_tokens":35}}"#,
        )
        .await;

        let generated = generator(base, 5).generate(&request()).await.unwrap();
        assert_eq!(generated.text, "Square a number.");
        assert_eq!(generated.total_tokens, 35);
    }

    #[tokio::test]
    async fn test_generate_unauthorized_is_quota_error() {
        let base = serve_once(
            "401 Unauthorized",
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#,
        )
        .await;

        let err = generator(base, 5).generate(&request()).await.unwrap_err();
        assert!(matches!(err, DocstringerError::GenerationQuota(_)));
    }

    #[tokio::test]
    async fn test_generate_empty_choices_is_format_error() {
        let base = serve_once("200 OK", r#"{"choices":[]}"#).await;
        let err = generator(base, 5).generate(&request()).await.unwrap_err();
        assert!(matches!(err, DocstringerError::GenerationFormat(_)));
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and never answer
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = generator(format!("http://{}/v1", addr), 1)
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, DocstringerError::GenerationTimeout(1)));
    }
}
