use thiserror::Error;

use chorus_llm::backend::LlmError;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Every fan-out call failed or returned empty content.
    #[error("no backend returned a valid response")]
    NoValidResponses,

    /// The fallback call failed too; nothing further to try.
    #[error("all backends failed: {0}")]
    AllBackendsFailed(String),

    /// A role points at a backend name missing from the registry.
    #[error("backend not configured: {0}")]
    UnknownBackend(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
