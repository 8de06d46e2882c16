//! Grounded answer generation.
//!
//! Builds a provider-agnostic chat request from the grounding rules, the
//! assembled context, the bounded conversation history, and the current
//! question, then invokes the injected `ChatCompleter`. Generation is
//! deterministic-leaning (low temperature, bounded output) so grounding
//! fidelity wins over stylistic variety.

use crate::brain::ChatCompleter;
use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::providers::with_retry;
use crate::types::{CompletionRequest, Message};
use std::sync::Arc;
use tracing::debug;

/// Fixed system instructions for grounded answering.
pub const SYSTEM_PROMPT: &str = "\
You are a NASA mission expert specializing in space missions, spacecraft, \
astronomy, and planetary science.

Rules:
- Use ONLY the provided context to answer the question.
- Cite sources using the format [DOC_ID] after each factual claim.
- If the answer is not in the context, say 'I don't know based on the provided documents.'
- Do NOT use outside knowledge.
- Keep answers clear, concise, and educational.";

/// Generates grounded answers through an injected chat-completion provider.
pub struct GroundedGenerator {
    completer: Arc<dyn ChatCompleter>,
    temperature: f32,
    max_tokens: usize,
    retry: RetryConfig,
}

impl GroundedGenerator {
    pub fn new(completer: Arc<dyn ChatCompleter>, config: &LlmConfig) -> Self {
        Self {
            completer,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: config.retry.clone(),
        }
    }

    /// Generate an answer for `question`, grounded in `context`, with
    /// `history` as prior turns.
    ///
    /// Does not update conversation memory; recording the exchange is the
    /// caller's responsibility, performed only after success. Provider errors
    /// propagate (after transient-error retries) so the caller decides
    /// whether the question is recorded as a failure.
    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[Message],
    ) -> Result<String, LlmError> {
        let messages = build_messages(question, context, history);
        debug!(
            message_count = messages.len(),
            has_context = !context.is_empty(),
            "Generating grounded answer"
        );

        let request = CompletionRequest {
            messages,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            model: None,
        };

        let response = with_retry(&self.retry, || {
            self.completer.complete(request.clone())
        })
        .await?;

        Ok(response.text)
    }

    pub fn model_name(&self) -> &str {
        self.completer.model_name()
    }
}

/// Assemble the outgoing message sequence:
/// system instructions, grounding context (when non-empty) as a second
/// system message, prior history in chronological order, then the question.
fn build_messages(question: &str, context: &str, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(Message::system(SYSTEM_PROMPT));

    if !context.is_empty() {
        messages.push(Message::system(format!(
            "Context to use for answering the question:\n{}",
            context
        )));
    }

    messages.extend(history.iter().cloned());
    messages.push(Message::user(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockChatCompleter;
    use crate::types::Role;
    use pretty_assertions::assert_eq;

    fn generator(completer: Arc<MockChatCompleter>) -> GroundedGenerator {
        let config = LlmConfig {
            retry: RetryConfig {
                max_retries: 0,
                initial_backoff_ms: 1,
                backoff_multiplier: 1.0,
                max_backoff_ms: 1,
                jitter: false,
            },
            ..Default::default()
        };
        GroundedGenerator::new(completer, &config)
    }

    #[test]
    fn test_build_messages_with_context_and_history() {
        let history = vec![Message::user("earlier q"), Message::assistant("earlier a")];
        let messages = build_messages("current q", "[DOC_1]\nsome context", &history);

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::System);
        assert!(messages[1].content.contains("[DOC_1]"));
        assert_eq!(messages[2].content, "earlier q");
        assert_eq!(messages[3].content, "earlier a");
        assert_eq!(messages[4].role, Role::User);
        assert_eq!(messages[4].content, "current q");
    }

    #[test]
    fn test_build_messages_empty_context_omits_context_message() {
        let messages = build_messages("q", "", &[]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].content, "q");
    }

    #[tokio::test]
    async fn test_generate_returns_answer_text() {
        let completer = Arc::new(MockChatCompleter::with_response(
            "Apollo 11 landed on July 20, 1969 [apollo_11].",
        ));
        let generator = generator(completer.clone());

        let answer = generator
            .generate("When did Apollo 11 land?", "[apollo_11]\n...", &[])
            .await
            .unwrap();

        assert_eq!(answer, "Apollo 11 landed on July 20, 1969 [apollo_11].");
        assert_eq!(completer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_applies_configured_parameters() {
        let completer = Arc::new(MockChatCompleter::with_response("ok"));
        let generator = generator(completer.clone());

        generator.generate("q", "", &[]).await.unwrap();

        let request = completer.requests().remove(0);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, Some(600));
    }

    #[tokio::test]
    async fn test_generate_propagates_provider_error() {
        let completer = Arc::new(MockChatCompleter::new());
        completer.queue_response(Err(LlmError::ApiRequest {
            message: "quota exceeded".into(),
        }));
        let generator = generator(completer);

        let result = generator.generate("q", "", &[]).await;
        assert!(matches!(result, Err(LlmError::ApiRequest { .. })));
    }

    #[tokio::test]
    async fn test_generate_retries_transient_errors() {
        let completer = Arc::new(MockChatCompleter::new());
        completer.queue_response(Err(LlmError::Connection {
            message: "refused".into(),
        }));
        completer.queue_response(Ok(MockChatCompleter::text_response("recovered")));

        let config = LlmConfig {
            retry: RetryConfig {
                max_retries: 1,
                initial_backoff_ms: 1,
                backoff_multiplier: 1.0,
                max_backoff_ms: 1,
                jitter: false,
            },
            ..Default::default()
        };
        let generator = GroundedGenerator::new(completer.clone(), &config);

        let answer = generator.generate("q", "", &[]).await.unwrap();
        assert_eq!(answer, "recovered");
        assert_eq!(completer.call_count(), 2);
    }
}
