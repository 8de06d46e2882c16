//! LLM provider abstraction.
//!
//! Defines the `ChatCompleter` trait for model-agnostic chat completions.
//! Concrete implementations live in `providers`; `MockChatCompleter` provides
//! a deterministic test double with a queued-response design.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::Mutex;

/// Trait for LLM chat-completion providers.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the configured model name.
    fn model_name(&self) -> &str;
}

/// A mock chat completer for testing and development.
///
/// Responses are queued and returned in order; every received request is
/// recorded so tests can assert on interaction counts and message shapes.
pub struct MockChatCompleter {
    model: String,
    responses: Mutex<Vec<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockChatCompleter {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a completer that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let completer = Self::new();
        for _ in 0..20 {
            completer.queue_response(Ok(Self::text_response(text)));
        }
        completer
    }

    /// Queue a response (or error) to be returned by the next `complete` call.
    pub fn queue_response(&self, response: Result<CompletionResponse, LlmError>) {
        self.responses.lock().unwrap().push(response);
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            text: text.to_string(),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
        }
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of `complete` calls received.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Messages of the most recent request, if any.
    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.messages.clone())
    }
}

impl Default for MockChatCompleter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatCompleter for MockChatCompleter {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Self::text_response("Mock answer. No queued responses."))
        } else {
            responses.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
