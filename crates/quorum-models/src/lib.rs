pub mod config;
pub mod health;
pub mod provider;
pub mod signal;

pub use config::{AggregationMode, EngineConfig, QuorumConfig, StoreConfig};
pub use health::{CircuitState, ProviderHealth};
pub use provider::{ProviderSpec, SpecError};
pub use signal::{
    FinalSignal, HistoricalSignal, ParsedResponse, ParsedSignal, RiskMetrics, SignalStatus,
    SignalType,
};
