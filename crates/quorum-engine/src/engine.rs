use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use quorum_models::{EngineConfig, FinalSignal, HistoricalSignal, ParsedResponse};
use quorum_store::SignalHistory;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapter::Provider;
use crate::aggregate::aggregate;
use crate::assemble::assemble;
use crate::dispatch::dispatch_all;
use crate::error::EngineError;
use crate::prompt::build_signal_prompt;

/// The result of one orchestration run.
///
/// `signal` is absent when zero providers produced a usable parsed signal;
/// that is a reported condition, not an error. The raw per-provider
/// responses are always surfaced for observability.
#[derive(Debug, Clone, Serialize)]
pub struct EngineOutcome {
    pub signal: Option<FinalSignal>,
    pub responses: Vec<ParsedResponse>,
}

/// Orchestrates one consensus run: prompt construction, parallel dispatch,
/// aggregation, assembly and history hand-off.
pub struct ConsensusEngine {
    providers: Vec<Arc<dyn Provider>>,
    history: Arc<dyn SignalHistory>,
    config: EngineConfig,
}

impl ConsensusEngine {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        history: Arc<dyn SignalHistory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            providers,
            history,
            config,
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Produce a consensus signal for `symbol` from the given market-context
    /// string (built by the technical-analysis collaborator, embedded
    /// verbatim into the prompt).
    pub async fn run(
        &self,
        symbol: &str,
        market_context: &str,
    ) -> Result<EngineOutcome, EngineError> {
        let start = Instant::now();
        info!(%symbol, providers = self.providers.len(), "Starting consensus run");

        let past: Vec<HistoricalSignal> = self
            .history
            .recent(self.config.history_prompt_limit)
            .await?
            .iter()
            .map(HistoricalSignal::from)
            .collect();

        let prompt = build_signal_prompt(symbol, market_context, &past);
        let extra = HashMap::from([("symbol".to_string(), symbol.to_string())]);

        let responses = dispatch_all(&self.providers, &prompt, &extra).await;
        let usable = responses.iter().filter(|r| r.is_usable()).count();
        info!(%symbol, settled = responses.len(), usable, "Providers settled");

        let Some(consensus) = aggregate(&responses, self.config.aggregation) else {
            warn!(%symbol, "No provider produced a usable signal");
            return Ok(EngineOutcome {
                signal: None,
                responses,
            });
        };

        let signal = assemble(symbol, &consensus, self.config.position_size_percent);
        self.history.append(&signal).await?;

        info!(
            %symbol,
            signal_type = signal.signal_type.as_str(),
            confidence = %signal.confidence,
            contributors = signal.contributors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Consensus complete"
        );

        Ok(EngineOutcome {
            signal: Some(signal),
            responses,
        })
    }
}
