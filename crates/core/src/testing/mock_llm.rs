//! Mock reasoning service client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Mock implementation of the LlmClient trait.
///
/// Replies are scripted: each call pops the next queued reply. With the
/// queue empty, calls fail with [`LlmError::NotConfigured`]. Every request
/// is recorded for assertions.
///
/// # Example
///
/// ```rust,ignore
/// use cxz_core::testing::{fixtures, MockLlmClient};
///
/// let llm = MockLlmClient::with_responses(vec![
///     Ok(fixtures::parse_reply("Pink Floyd", "Animals", &[], 0.9)),
///     Err(LlmError::Timeout(Duration::from_secs(30))),
/// ]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    responses: Arc<RwLock<VecDeque<Result<String, LlmError>>>>,
    requests: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl MockLlmClient {
    /// Create a mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers calls with `responses`, in order.
    pub fn with_responses(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses.into())),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue a successful reply.
    pub async fn push_response(&self, text: impl Into<String>) {
        self.responses.write().await.push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub async fn push_error(&self, error: LlmError) {
        self.responses.write().await.push_back(Err(error));
    }

    /// Requests received so far.
    pub async fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().await.clone()
    }

    /// Number of calls made.
    pub async fn call_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.write().await.push(request);

        let text = self
            .responses
            .write()
            .await
            .pop_front()
            .unwrap_or(Err(LlmError::NotConfigured))?;

        Ok(CompletionResponse {
            text,
            usage: LlmUsage {
                input_tokens: 200,
                output_tokens: 100,
            },
            model: "mock-model".to_string(),
        })
    }
}
