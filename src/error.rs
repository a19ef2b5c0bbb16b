use crate::llm::LlmError;

/// Errors surfaced by the scoring engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty or whitespace-only input. Scoring is never attempted.
    #[error("no content to analyze")]
    InvalidInput,
    /// The hosted model failed. Non-fatal: the session and the scorer stay usable.
    #[error("external service error: {0}")]
    ExternalService(#[from] LlmError),
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("invalid dictionary: {0}")]
    InvalidDictionary(String),
}
