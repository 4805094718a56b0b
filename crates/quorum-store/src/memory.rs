use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use quorum_models::{FinalSignal, ProviderHealth};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::{HealthStore, SecretStore, SignalHistory};

/// In-memory store implementing every repository trait.
///
/// Used by tests and by embedders that manage persistence themselves.
pub struct MemoryStore {
    health: RwLock<HashMap<String, ProviderHealth>>,
    secrets: RwLock<HashMap<String, HashMap<String, String>>>,
    history: RwLock<VecDeque<FinalSignal>>,
    max_history: usize,
}

impl MemoryStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            health: RwLock::new(HashMap::new()),
            secrets: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
        }
    }

    pub async fn set_secrets(&self, provider_id: &str, values: HashMap<String, String>) {
        self.secrets
            .write()
            .await
            .insert(provider_id.to_string(), values);
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderHealth>, StoreError> {
        Ok(self.health.read().await.get(provider_id).cloned())
    }

    async fn put(&self, health: &ProviderHealth) -> Result<(), StoreError> {
        self.health
            .write()
            .await
            .insert(health.provider_id.clone(), health.clone());
        Ok(())
    }

    async fn remove(&self, provider_id: &str) -> Result<(), StoreError> {
        self.health.write().await.remove(provider_id);
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn secrets(
        &self,
        provider_id: &str,
    ) -> Result<Option<HashMap<String, String>>, StoreError> {
        Ok(self.secrets.read().await.get(provider_id).cloned())
    }
}

#[async_trait]
impl SignalHistory for MemoryStore {
    async fn append(&self, signal: &FinalSignal) -> Result<(), StoreError> {
        let mut history = self.history.write().await;
        history.push_front(signal.clone());
        while history.len() > self.max_history {
            history.pop_back();
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<FinalSignal>, StoreError> {
        Ok(self.history.read().await.iter().take(limit).cloned().collect())
    }
}
