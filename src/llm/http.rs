//! HTTP-based model providers.
//!
//! Speaks the OpenAI-compatible chat completions API (Google Gemini, OpenAI,
//! DeepSeek, ...) and Anthropic's native Messages API.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider kind, inferred from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    OpenAi,
    Anthropic,
    DeepSeek,
    /// Falls back to OpenAI-compatible format.
    Unknown,
}

impl ProviderKind {
    pub fn from_model(model: &str) -> Self {
        let m = model.to_lowercase();
        if m.starts_with("gemini-") {
            Self::Google
        } else if m.starts_with("gpt-")
            || m.starts_with("o1-")
            || m.starts_with("o3-")
            || m.starts_with("o4-")
        {
            Self::OpenAi
        } else if m.starts_with("claude-") {
            Self::Anthropic
        } else if m.starts_with("deepseek-") {
            Self::DeepSeek
        } else {
            Self::Unknown
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }
}

// ── OpenAI-compatible request/response types ──

#[derive(Serialize)]
struct OaiRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Anthropic Messages API types ──

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<OaiMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ── Provider ──

pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        Self::with_timeout(model, api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        model: String,
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        let kind = ProviderKind::from_model(&model);
        let base = base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "http client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            kind,
            model,
            client,
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.kind {
            ProviderKind::Anthropic => format!("{}/v1/messages", self.base_url),
            _ => format!("{}/chat/completions", self.base_url),
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Map a non-success status to an error; 429 is rate limiting (quota).
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Unknown => "unknown",
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        match self.kind {
            ProviderKind::Anthropic => Box::pin(self.complete_anthropic(request)),
            _ => Box::pin(self.complete_openai(request)),
        }
    }
}

impl HttpProvider {
    /// POST `body` and return the raw response text of a successful call.
    async fn send<B: Serialize>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<String, LlmError> {
        let resp = request
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }
        resp.text()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))
    }

    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = OaiRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| OaiMessage {
                    role: role_str(m.role),
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let builder = self.client.post(self.endpoint()).bearer_auth(&self.api_key);
        let raw = self.send(builder, &body).await?;
        parse_openai(&raw)
    }

    async fn complete_anthropic(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // Anthropic takes the system prompt at top level.
        let mut system = None;
        let messages: Vec<OaiMessage<'_>> = request
            .messages
            .iter()
            .filter_map(|m| {
                if m.role == Role::System {
                    system = Some(m.content.as_str());
                    None
                } else {
                    Some(OaiMessage {
                        role: role_str(m.role),
                        content: &m.content,
                    })
                }
            })
            .collect();

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system,
            messages,
            temperature: request.temperature,
        };

        let builder = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let raw = self.send(builder, &body).await?;
        parse_anthropic(&raw)
    }
}

fn parse_openai(raw: &str) -> Result<CompletionResponse, LlmError> {
    let api: OaiResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let content = api
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::MalformedResponse("no choices in response".into()))?;
    let (input_tokens, output_tokens) = api
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    Ok(CompletionResponse {
        content,
        input_tokens,
        output_tokens,
    })
}

fn parse_anthropic(raw: &str) -> Result<CompletionResponse, LlmError> {
    let api: AnthropicResponse =
        serde_json::from_str(raw).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    let content: String = api
        .content
        .into_iter()
        .filter_map(|b| match b {
            AnthropicResponseBlock::Text { text } => Some(text),
            AnthropicResponseBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");
    if content.is_empty() {
        return Err(LlmError::MalformedResponse("no text blocks in response".into()));
    }
    let (input_tokens, output_tokens) = api
        .usage
        .map(|u| (u.input_tokens, u.output_tokens))
        .unwrap_or((0, 0));

    Ok(CompletionResponse {
        content,
        input_tokens,
        output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_provider_kinds() {
        assert_eq!(ProviderKind::from_model("gemini-1.5-flash"), ProviderKind::Google);
        assert_eq!(ProviderKind::from_model("gpt-4o"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_model("o3-mini"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_model("claude-sonnet-4-5"), ProviderKind::Anthropic);
        assert_eq!(ProviderKind::from_model("deepseek-chat"), ProviderKind::DeepSeek);
        assert_eq!(ProviderKind::from_model("llama-3"), ProviderKind::Unknown);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(ProviderKind::from_model("Gemini-Pro"), ProviderKind::Google);
        assert_eq!(ProviderKind::from_model("GPT-4o"), ProviderKind::OpenAi);
    }

    #[test]
    fn default_model_uses_google_openai_endpoint() {
        let p = HttpProvider::new(DEFAULT_MODEL.into(), "key".into(), None);
        assert_eq!(
            p.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
        assert_eq!(p.name(), "google");
    }

    #[test]
    fn anthropic_endpoint() {
        let p = HttpProvider::new("claude-sonnet-4-5".into(), "sk-ant-test".into(), None);
        assert_eq!(p.endpoint(), "https://api.anthropic.com/v1/messages");
        assert_eq!(p.name(), "anthropic");
    }

    #[test]
    fn custom_base_url_override() {
        let p = HttpProvider::new(
            "gpt-4o".into(),
            "sk-test".into(),
            Some("https://my-proxy.example/v1/".into()),
        );
        assert_eq!(p.endpoint(), "https://my-proxy.example/v1/chat/completions");
    }

    #[test]
    fn rate_limit_maps_to_rate_limited() {
        let err = check_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(err, LlmError::RateLimited));
        let err = check_error(reqwest::StatusCode::UNAUTHORIZED, "bad key".into());
        assert_eq!(err.to_string(), "request failed: 401 Unauthorized: bad key");
    }

    #[test]
    fn openai_body_is_parsed() {
        let resp = parse_openai(
            r#"{"choices":[{"message":{"content":"小心詐騙"}}],"usage":{"prompt_tokens":12,"completion_tokens":4}}"#,
        )
        .unwrap();
        assert_eq!(resp.content, "小心詐騙");
        assert_eq!((resp.input_tokens, resp.output_tokens), (12, 4));
    }

    #[test]
    fn malformed_openai_bodies_are_rejected() {
        for raw in [
            "<html>502 Bad Gateway</html>",
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"error":{"message":"quota"}}"#,
        ] {
            let err = parse_openai(raw).unwrap_err();
            assert!(matches!(err, LlmError::MalformedResponse(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn anthropic_body_skips_non_text_blocks() {
        let resp = parse_anthropic(
            r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"小心"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.content, "小心");
        assert_eq!(resp.input_tokens, 0);
    }

    #[test]
    fn malformed_anthropic_bodies_are_rejected() {
        for raw in [
            "not json",
            r#"{"content":[]}"#,
            r#"{"content":[{"type":"tool_use","id":"t1","name":"x","input":{}}]}"#,
        ] {
            let err = parse_anthropic(raw).unwrap_err();
            assert!(matches!(err, LlmError::MalformedResponse(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn debug_output_hides_api_key() {
        let p = HttpProvider::new("gpt-4o".into(), "sk-secret".into(), None);
        let debug = format!("{p:?}");
        assert!(debug.contains("gpt-4o"));
        assert!(!debug.contains("sk-secret"));
    }
}
