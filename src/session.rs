//! Caller-owned chat history for the hosted model.

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, Role};
use crate::Error;

pub const SYSTEM_INSTRUCTION: &str = "\
你是一位資深的詐騙防制專家，專精於分析「殺豬盤」與情感詐騙。
請針對使用者提供的對話內容進行分析，指出其中的疑點、心理操縱手法，
並給出風險評估（低、中、高）。如果內容涉及金錢、投資、緊急匯款，請給予強烈警告。
請用溫和但在地的台灣繁體中文口吻回答，適合長輩閱讀。";

pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Ordered `(role, content)` turns, starting with the system instruction.
#[derive(Debug, Clone)]
pub struct ChatSession {
    turns: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(SYSTEM_INSTRUCTION)
    }
}

impl ChatSession {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatMessage::new(Role::System, system_instruction)],
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// Drop every turn except the system instruction.
    pub fn clear(&mut self) {
        self.turns.truncate(1);
    }

    /// Send `text` with the accumulated history and record the reply.
    ///
    /// On failure the user turn is rolled back so a retry does not duplicate
    /// it; the session stays usable.
    pub async fn ask(&mut self, provider: &dyn LlmProvider, text: &str) -> Result<String, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput);
        }

        self.turns.push(ChatMessage::new(Role::User, text));
        let request = CompletionRequest {
            messages: self.turns.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        match provider.complete(request).await {
            Ok(resp) => {
                tracing::debug!(
                    provider = provider.name(),
                    input_tokens = resp.input_tokens,
                    output_tokens = resp.output_tokens,
                    "model replied"
                );
                self.turns
                    .push(ChatMessage::new(Role::Assistant, resp.content.clone()));
                Ok(resp.content)
            }
            Err(e) => {
                self.turns.pop();
                tracing::warn!(provider = provider.name(), error = %e, "model call failed");
                Err(Error::ExternalService(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, LlmError, MockProvider};
    use std::future::Future;
    use std::pin::Pin;

    struct FailingProvider;

    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
            Box::pin(async { Err(LlmError::RateLimited) })
        }
    }

    #[tokio::test]
    async fn ask_accumulates_turns() {
        let provider = MockProvider::new("這段對話風險很高。");
        let mut session = ChatSession::default();

        let reply = session.ask(&provider, "  寶貝，先小額試試  ").await.unwrap();
        assert_eq!(reply, "這段對話風險很高。");
        session.ask(&provider, "那我該怎麼辦？").await.unwrap();

        let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(session.turns()[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(session.turns()[1].content, "寶貝，先小額試試");
    }

    #[tokio::test]
    async fn failure_is_non_fatal_and_rolled_back() {
        let mut session = ChatSession::default();
        let err = session.ask(&FailingProvider, "在嗎").await.unwrap_err();
        assert!(matches!(err, Error::ExternalService(LlmError::RateLimited)));
        assert_eq!(err.to_string(), "external service error: rate limited");
        assert_eq!(session.turns().len(), 1);

        let reply = session.ask(&MockProvider::new("ok"), "在嗎").await.unwrap();
        assert_eq!(reply, "ok");
        assert_eq!(session.turns().len(), 3);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let mut session = ChatSession::default();
        let err = session.ask(&MockProvider::new("x"), " \n ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput));
        assert_eq!(session.turns().len(), 1);
    }

    #[tokio::test]
    async fn clear_keeps_system_instruction() {
        let mut session = ChatSession::new("custom");
        session.ask(&MockProvider::new("reply"), "hi").await.unwrap();
        session.clear();
        assert_eq!(session.turns(), &[ChatMessage::new(Role::System, "custom")]);
    }
}
