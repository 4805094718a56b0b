use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use quorum_models::{CircuitState, ProviderHealth};
use quorum_store::{HealthStore, StoreError};
use tracing::warn;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 60_000;

/// Per-provider circuit breaker over an injected health store.
///
/// Records are read-modify-write without compare-and-swap: two concurrent
/// probes can both observe HALF_OPEN and slip through. That costs at most a
/// few extra calls and is an accepted relaxed-consistency behavior, not a
/// correctness bug.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn HealthStore>,
    failure_threshold: u32,
    open_timeout_ms: i64,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn HealthStore>, failure_threshold: u32, open_timeout_ms: u64) -> Self {
        Self {
            store,
            failure_threshold,
            open_timeout_ms: open_timeout_ms as i64,
        }
    }

    /// Effective state for the provider, applying the lazy OPEN -> HALF_OPEN
    /// transition. Never mutates the stored record.
    pub async fn check(&self, provider_id: &str) -> Result<CircuitState, StoreError> {
        let health = self.load(provider_id).await?;
        Ok(self.effective_state(&health))
    }

    /// Reset to CLOSED with a zeroed failure count.
    pub async fn record_success(&self, provider_id: &str) -> Result<(), StoreError> {
        let mut health = self.load(provider_id).await?;
        health.state = CircuitState::Closed;
        health.failure_count = 0;
        health.last_attempt = Utc::now();
        self.store.put(&health).await
    }

    /// Count a failure. Opens the circuit at the threshold; a failed
    /// HALF_OPEN probe re-opens immediately without threshold accumulation.
    pub async fn record_failure(&self, provider_id: &str) -> Result<(), StoreError> {
        let mut health = self.load(provider_id).await?;
        match self.effective_state(&health) {
            CircuitState::HalfOpen => {
                health.state = CircuitState::Open;
                health.failure_count += 1;
                warn!(provider = provider_id, "Recovery probe failed, circuit re-opened");
            }
            _ => {
                health.failure_count += 1;
                if health.failure_count >= self.failure_threshold {
                    health.state = CircuitState::Open;
                    warn!(
                        provider = provider_id,
                        failures = health.failure_count,
                        "Circuit opened"
                    );
                }
            }
        }
        health.last_attempt = Utc::now();
        self.store.put(&health).await
    }

    fn effective_state(&self, health: &ProviderHealth) -> CircuitState {
        match health.state {
            CircuitState::Open => {
                let elapsed = Utc::now() - health.last_attempt;
                if elapsed > ChronoDuration::milliseconds(self.open_timeout_ms) {
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                }
            }
            other => other,
        }
    }

    async fn load(&self, provider_id: &str) -> Result<ProviderHealth, StoreError> {
        Ok(self
            .store
            .get(provider_id)
            .await?
            .unwrap_or_else(|| ProviderHealth::new(provider_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_store::MemoryStore;

    fn breaker(store: &Arc<MemoryStore>) -> CircuitBreaker {
        CircuitBreaker::new(
            Arc::clone(store) as Arc<dyn HealthStore>,
            DEFAULT_FAILURE_THRESHOLD,
            DEFAULT_OPEN_TIMEOUT_MS,
        )
    }

    /// Force the stored record into OPEN with a backdated last_attempt.
    async fn backdate_open(store: &MemoryStore, provider_id: &str, age_ms: i64) {
        let mut health = ProviderHealth::new(provider_id);
        health.state = CircuitState::Open;
        health.failure_count = DEFAULT_FAILURE_THRESHOLD;
        health.last_attempt = Utc::now() - ChronoDuration::milliseconds(age_ms);
        store.put(&health).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_provider_starts_closed() {
        let store = Arc::new(MemoryStore::default());
        let breaker = breaker(&store);
        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let store = Arc::new(MemoryStore::default());
        let breaker = breaker(&store);

        breaker.record_failure("p1").await.unwrap();
        breaker.record_failure("p1").await.unwrap();
        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::Closed);

        breaker.record_failure("p1").await.unwrap();
        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_before_timeout_stays_open() {
        let store = Arc::new(MemoryStore::default());
        let breaker = breaker(&store);
        backdate_open(&store, "p1", 1_000).await;

        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_after_timeout_reads_half_open_without_mutation() {
        let store = Arc::new(MemoryStore::default());
        let breaker = breaker(&store);
        backdate_open(&store, "p1", DEFAULT_OPEN_TIMEOUT_MS as i64 + 1_000).await;

        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::HalfOpen);

        // The stored record is untouched by the read.
        let stored = HealthStore::get(store.as_ref(), "p1").await.unwrap().unwrap();
        assert_eq!(stored.state, CircuitState::Open);
    }

    #[tokio::test]
    async fn failed_probe_reopens_immediately() {
        let store = Arc::new(MemoryStore::default());
        let breaker = breaker(&store);
        backdate_open(&store, "p1", DEFAULT_OPEN_TIMEOUT_MS as i64 + 1_000).await;

        breaker.record_failure("p1").await.unwrap();

        // last_attempt was refreshed, so the circuit reads OPEN again.
        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_from_any_state() {
        let store = Arc::new(MemoryStore::default());
        let breaker = breaker(&store);
        backdate_open(&store, "p1", DEFAULT_OPEN_TIMEOUT_MS as i64 + 1_000).await;

        breaker.record_success("p1").await.unwrap();

        let stored = HealthStore::get(store.as_ref(), "p1").await.unwrap().unwrap();
        assert_eq!(stored.state, CircuitState::Closed);
        assert_eq!(stored.failure_count, 0);
        assert_eq!(breaker.check("p1").await.unwrap(), CircuitState::Closed);
    }
}
