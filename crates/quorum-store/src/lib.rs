pub mod error;
pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use quorum_models::{FinalSignal, ProviderHealth};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key prefix for health records in key-value backed stores.
pub const HEALTH_KEY_PREFIX: &str = "provider_health:";
/// Key prefix for secret snapshots in key-value backed stores.
pub const SECRETS_KEY_PREFIX: &str = "provider_secrets:";

/// Persisted circuit-breaker records, keyed by provider id.
///
/// Injected into the engine at construction; the core holds no
/// process-wide singletons.
#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderHealth>, StoreError>;
    async fn put(&self, health: &ProviderHealth) -> Result<(), StoreError>;
    /// Removed only alongside the provider's spec.
    async fn remove(&self, provider_id: &str) -> Result<(), StoreError>;
}

/// Secret values for template placeholders, keyed by provider id.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read-only snapshot of the placeholder -> value map for one provider.
    async fn secrets(&self, provider_id: &str)
        -> Result<Option<HashMap<String, String>>, StoreError>;
}

/// Append-only signal history with bounded retention.
#[async_trait]
pub trait SignalHistory: Send + Sync {
    async fn append(&self, signal: &FinalSignal) -> Result<(), StoreError>;
    /// Most recent signals first.
    async fn recent(&self, limit: usize) -> Result<Vec<FinalSignal>, StoreError>;
}
