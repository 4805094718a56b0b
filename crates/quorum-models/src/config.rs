use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::provider::{ProviderSpec, SpecError};

/// Top-level configuration for Quorum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuorumConfig {
    pub engine: EngineConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

impl QuorumConfig {
    pub fn validate(&self) -> Result<(), SpecError> {
        ProviderSpec::validate_all(&self.providers)
    }
}

/// Winner selection strategy for the aggregator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Group with the largest vote count.
    Majority,
    /// Group maximizing `count * mean_confidence`.
    #[default]
    Weighted,
    /// Type of the first usable response in dispatch order.
    First,
}

/// Configuration for the consensus engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub aggregation: AggregationMode,
    /// Consecutive failures before a provider's circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit stays closed to traffic before a probe call.
    pub open_timeout_ms: u64,
    /// Position size carried into the final signal's risk metrics.
    pub position_size_percent: Decimal,
    /// How many past signals are rendered into the prompt.
    pub history_prompt_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationMode::Weighted,
            failure_threshold: 3,
            open_timeout_ms: 60_000,
            position_size_percent: Decimal::new(2, 0),
            history_prompt_limit: 5,
        }
    }
}

/// Configuration for the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path to the SQLite file holding health records, secrets and history.
    pub sqlite_path: String,
    /// Bounded retention for signal history; oldest entries dropped beyond this.
    pub max_history: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/quorum.db".to_string(),
            max_history: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn roundtrip_quorum_config() {
        let config = QuorumConfig {
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
            providers: vec![ProviderSpec::new(
                "openai",
                "https://api.openai.com/v1/chat/completions",
            )],
        };

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: QuorumConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn default_engine_config() {
        let engine = EngineConfig::default();
        assert_eq!(engine.aggregation, AggregationMode::Weighted);
        assert_eq!(engine.failure_threshold, 3);
        assert_eq!(engine.open_timeout_ms, 60_000);
        assert_eq!(engine.position_size_percent, dec!(2));
    }

    #[test]
    fn aggregation_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AggregationMode::Majority).unwrap(),
            "\"majority\""
        );
        assert_eq!(
            serde_json::to_string(&AggregationMode::First).unwrap(),
            "\"first\""
        );
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[engine]
aggregation = "majority"
failure_threshold = 5
open_timeout_ms = 30000
position_size_percent = "1.5"
history_prompt_limit = 3

[store]
sqlite_path = "/tmp/quorum_test.db"
max_history = 50

[[providers]]
id = "openai"
endpoint = "https://api.openai.com/v1/chat/completions"
model = "gpt-4o-mini"
headers = [["Authorization", "Bearer {{API_KEY}}"]]

[[providers]]
id = "groq"
endpoint = "https://api.groq.com/openai/v1/chat/completions"
timeout_ms = 5000
max_retries = 2
"#;

        let config: QuorumConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.aggregation, AggregationMode::Majority);
        assert_eq!(config.engine.failure_threshold, 5);
        assert_eq!(config.store.max_history, 50);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].headers.len(), 1);
        assert_eq!(config.providers[1].timeout_ms, 5000);
        config.validate().unwrap();
    }

    #[test]
    fn validate_surfaces_provider_errors() {
        let config = QuorumConfig {
            engine: EngineConfig::default(),
            store: StoreConfig::default(),
            providers: vec![ProviderSpec::new("bad", "::not-a-url::")],
        };
        assert!(config.validate().is_err());
    }
}
