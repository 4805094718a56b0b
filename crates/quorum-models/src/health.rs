use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Circuit breaker state for one provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls permitted.
    Closed,
    /// Calls refused without network I/O.
    Open,
    /// Exactly one trial call permitted to probe recovery.
    HalfOpen,
}

/// Persisted health record for one provider.
///
/// Created lazily on first read with `Closed`/0. The `Open -> HalfOpen`
/// transition is a read-side view and never mutates the stored record;
/// only `record_success`/`record_failure` write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_attempt: DateTime<Utc>,
}

impl ProviderHealth {
    pub fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            state: CircuitState::Closed,
            failure_count: 0,
            last_attempt: Utc::now(),
        }
    }
}
