//! Reasoning service client abstraction and implementations.
//!
//! The core talks to a language model through [`LlmClient`], a narrow
//! completion contract. Clients hold no credentials: every
//! [`CompletionRequest`] carries its own [`ApiKey`].

mod anthropic;
mod config;
mod gemini;
mod ollama;

pub use anthropic::AnthropicClient;
pub use config::{LlmConfig, LlmProvider};
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("No credential supplied for provider {0}")]
    MissingCredential(String),

    #[error("Not configured")]
    NotConfigured,
}

/// An API credential.
///
/// Serializes transparently so it can live in config files, but never
/// prints its value through `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmUsage {
    pub fn add(&mut self, other: &LlmUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
    /// Ask the provider for a JSON-only reply where it supports that
    pub expect_json: bool,
    /// Credential for this call
    pub credential: Option<ApiKey>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.0, // Deterministic by default for parsing and scoring
            expect_json: false,
            credential: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.expect_json = true;
        self
    }

    pub fn with_credential(mut self, credential: Option<ApiKey>) -> Self {
        self.credential = credential;
        self
    }

    /// The credential, or `MissingCredential` for providers that need one.
    pub(crate) fn require_credential(&self, provider: &str) -> Result<&ApiKey, LlmError> {
        self.credential
            .as_ref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::MissingCredential(provider.to_string()))
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,
    /// Token usage
    pub usage: LlmUsage,
    /// Model used
    pub model: String,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "gemini", "anthropic", "ollama")
    fn provider(&self) -> &str;

    /// Model name (e.g., "gemini-1.5-flash")
    fn model(&self) -> &str;

    /// Send a completion request and get a text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Slice out the outermost JSON object of a model reply.
///
/// Models often wrap JSON in prose or Markdown fences; everything outside
/// the first `{` and the last `}` is dropped. Text without braces is
/// returned unchanged so the JSON error names the real reply.
pub fn extract_json_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Factory function to create the configured reasoning service client.
pub fn create_llm_client(config: &LlmConfig) -> Arc<dyn LlmClient> {
    let timeout = Duration::from_secs(config.timeout_secs as u64);

    match config.provider {
        LlmProvider::Gemini => {
            let mut client = GeminiClient::new(&config.model).with_timeout(timeout);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
        LlmProvider::Anthropic => {
            let mut client = AnthropicClient::new(&config.model).with_timeout(timeout);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
        LlmProvider::Ollama => {
            let mut client = OllamaClient::new(&config.model).with_timeout(timeout);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
    }
}

/// Run a provider call under the client's timeout.
pub(crate) async fn run_with_timeout<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T, LlmError>>,
) -> Result<T, LlmError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("Hello")
            .with_system("You are helpful")
            .with_max_tokens(100)
            .with_temperature(0.5)
            .with_json_output()
            .with_credential(Some(ApiKey::new("k")));

        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.system, Some("You are helpful".to_string()));
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.5);
        assert!(request.expect_json);
        assert_eq!(request.credential, Some(ApiKey::new("k")));
    }

    #[test]
    fn test_require_credential() {
        let request = CompletionRequest::new("x");
        assert!(matches!(
            request.require_credential("gemini"),
            Err(LlmError::MissingCredential(p)) if p == "gemini"
        ));

        let request = request.with_credential(Some(ApiKey::new("   ")));
        assert!(request.require_credential("gemini").is_err());

        let request = request.with_credential(Some(ApiKey::new("secret")));
        assert_eq!(request.require_credential("gemini").unwrap().expose(), "secret");
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-very-secret");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
        assert_eq!(key.expose(), "sk-very-secret");
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), r#"{"a":1}"#);
        assert_eq!(
            extract_json_object("Sure!\n```json\n{\"a\": {\"b\": 2}}\n```"),
            r#"{"a": {"b": 2}}"#
        );
        assert_eq!(extract_json_object("no json here"), "no json here");
        assert_eq!(extract_json_object("} backwards {"), "} backwards {");
    }

    #[test]
    fn test_usage_add() {
        let mut total = LlmUsage::default();
        total.add(&LlmUsage {
            input_tokens: 10,
            output_tokens: 5,
        });
        total.add(&LlmUsage {
            input_tokens: 1,
            output_tokens: 2,
        });
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 7);
    }

    #[test]
    fn test_create_llm_client_per_provider() {
        let mut config = LlmConfig::default();
        let client = create_llm_client(&config);
        assert_eq!(client.provider(), "gemini");
        assert_eq!(client.model(), "gemini-1.5-flash");

        config.provider = LlmProvider::Anthropic;
        config.model = "claude-3-haiku-20240307".to_string();
        assert_eq!(create_llm_client(&config).provider(), "anthropic");

        config.provider = LlmProvider::Ollama;
        config.model = "llama3".to_string();
        let client = create_llm_client(&config);
        assert_eq!(client.provider(), "ollama");
        assert_eq!(client.model(), "llama3");
    }
}
