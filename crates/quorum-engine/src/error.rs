use quorum_store::StoreError;
use thiserror::Error;

/// Failure kinds for a single provider call.
///
/// None of these are fatal to a dispatch: the adapter collapses each into a
/// failed `ParsedResponse` so the aggregator always sees every provider's
/// outcome.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Circuit breaker is open for provider {provider}")]
    CircuitOpen { provider: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("invalid response schema: {0}")]
    Schema(String),

    #[error("no trading signal found in provider response")]
    NoSignal,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Transport-level failures are retried with backoff; a structurally
    /// wrong response would not be fixed by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transport(_) | ProviderError::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
