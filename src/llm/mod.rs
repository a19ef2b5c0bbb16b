//! Hosted conversational model collaborators.

pub mod http;
pub mod provider;

pub use http::{HttpProvider, ProviderKind};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, LlmProvider, MockProvider, Role,
};
