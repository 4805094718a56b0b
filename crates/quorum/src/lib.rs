//! Quorum - multi-provider LLM consensus trading signals.
//!
//! Dispatches one market-analysis prompt to several configured LLM endpoints
//! in parallel, parses each response into a partial trading signal, and
//! reduces the usable responses into a single consensus signal with derived
//! risk metrics.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use quorum::models::{QuorumConfig, ProviderSpec, AggregationMode};
//! use quorum::engine::{ConsensusEngine, HttpProvider, Provider};
//! use quorum::store::{SqliteStore, MemoryStore, SignalHistory};
//! ```

pub use quorum_engine as engine;
pub use quorum_models as models;
pub use quorum_store as store;

use std::sync::Arc;

use anyhow::Context;
use quorum_engine::{CircuitBreaker, ConsensusEngine, EngineOutcome, HttpProvider, Provider};
use quorum_engine::{HttpTransport, Transport};
use quorum_models::QuorumConfig;
use quorum_store::{HealthStore, SecretStore, SignalHistory, SqliteStore};

/// Build a ConsensusEngine from configuration.
///
/// Opens the SQLite store, validates every provider spec, and wires one
/// circuit breaker and HTTP adapter per provider over a shared transport.
pub fn build_engine(config: &QuorumConfig) -> Result<ConsensusEngine, anyhow::Error> {
    config.validate().context("Invalid provider configuration")?;

    let store = Arc::new(
        SqliteStore::open(&config.store.sqlite_path, config.store.max_history)
            .with_context(|| format!("Failed to open store: {}", config.store.sqlite_path))?,
    );
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new().map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?,
    );

    let providers: Vec<Arc<dyn Provider>> = config
        .providers
        .iter()
        .map(|spec| {
            let breaker = CircuitBreaker::new(
                Arc::clone(&store) as Arc<dyn HealthStore>,
                config.engine.failure_threshold,
                config.engine.open_timeout_ms,
            );
            Arc::new(HttpProvider::new(
                spec.clone(),
                Arc::clone(&store) as Arc<dyn SecretStore>,
                breaker,
                Arc::clone(&transport),
            )) as Arc<dyn Provider>
        })
        .collect();

    Ok(ConsensusEngine::new(
        providers,
        store as Arc<dyn SignalHistory>,
        config.engine.clone(),
    ))
}

/// Run one consensus pass for `symbol` over the given market context.
pub async fn run(
    engine: &ConsensusEngine,
    symbol: &str,
    market_context: &str,
) -> Result<EngineOutcome, quorum_engine::EngineError> {
    engine.run(symbol, market_context).await
}
