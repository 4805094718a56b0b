use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use quorum_models::{FinalSignal, ProviderHealth};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::{HealthStore, SecretStore, SignalHistory, HEALTH_KEY_PREFIX, SECRETS_KEY_PREFIX};

/// SQLite-backed store for health records, secret snapshots and signal history.
///
/// Health and secrets live in a generic key-value table keyed
/// `provider_health:<id>` / `provider_secrets:<id>`; history lives in its own
/// table trimmed to `max_history` rows on every append.
///
/// Access is synchronized via `Mutex` since `rusqlite::Connection` is not `Sync`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_history: usize,
}

impl SqliteStore {
    pub fn open(path: &str, max_history: usize) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_history,
        })
    }

    pub fn open_in_memory(max_history: usize) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_history,
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS signals (
                id         TEXT PRIMARY KEY,
                symbol     TEXT NOT NULL,
                value_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_created ON signals(created_at);",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value_json FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn kv_put(&self, key: &str, value_json: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
            params![key, value_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn kv_remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Provision a provider's secret snapshot. Operator-facing; the engine
    /// only ever reads through the `SecretStore` trait.
    pub fn put_secrets(
        &self,
        provider_id: &str,
        values: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(values)?;
        self.kv_put(&format!("{SECRETS_KEY_PREFIX}{provider_id}"), &json)
    }
}

#[async_trait]
impl HealthStore for SqliteStore {
    async fn get(&self, provider_id: &str) -> Result<Option<ProviderHealth>, StoreError> {
        match self.kv_get(&format!("{HEALTH_KEY_PREFIX}{provider_id}"))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, health: &ProviderHealth) -> Result<(), StoreError> {
        let json = serde_json::to_string(health)?;
        self.kv_put(&format!("{HEALTH_KEY_PREFIX}{}", health.provider_id), &json)
    }

    async fn remove(&self, provider_id: &str) -> Result<(), StoreError> {
        self.kv_remove(&format!("{HEALTH_KEY_PREFIX}{provider_id}"))
    }
}

#[async_trait]
impl SecretStore for SqliteStore {
    async fn secrets(
        &self,
        provider_id: &str,
    ) -> Result<Option<HashMap<String, String>>, StoreError> {
        match self.kv_get(&format!("{SECRETS_KEY_PREFIX}{provider_id}"))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SignalHistory for SqliteStore {
    async fn append(&self, signal: &FinalSignal) -> Result<(), StoreError> {
        let json = serde_json::to_string(signal)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO signals (id, symbol, value_json, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                signal.id.to_string(),
                signal.symbol,
                json,
                signal.timestamp.to_rfc3339()
            ],
        )?;
        // Bounded retention: drop everything beyond the newest max_history rows.
        conn.execute(
            "DELETE FROM signals WHERE id NOT IN (
                SELECT id FROM signals ORDER BY created_at DESC, rowid DESC LIMIT ?1
            )",
            params![self.max_history as i64],
        )?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<FinalSignal>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT value_json FROM signals ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(serde_json::from_str(&row?)?);
        }
        Ok(signals)
    }
}
