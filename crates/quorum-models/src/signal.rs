use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a trading signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => "HOLD",
        }
    }

    /// Case-insensitive match against the three signal words.
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(SignalType::Buy),
            "SELL" => Some(SignalType::Sell),
            "HOLD" => Some(SignalType::Hold),
            _ => None,
        }
    }
}

/// A partial signal recovered from one provider's response text.
///
/// Every field is optional; providers frequently return only a subset.
/// An instance with no recognized fields at all is not a usable signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedSignal {
    pub signal_type: Option<SignalType>,
    /// 0 to 100.
    pub confidence: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reasoning: Option<String>,
}

impl ParsedSignal {
    pub fn is_empty(&self) -> bool {
        self.signal_type.is_none()
            && self.confidence.is_none()
            && self.price.is_none()
            && self.stop_loss.is_none()
            && self.take_profit.is_none()
            && self.reasoning.is_none()
    }
}

/// The settled outcome of one provider call, success or failure.
/// Immutable once produced; consumed by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedResponse {
    pub provider_id: String,
    /// Opaque response body as received (empty when no round-trip happened).
    pub raw: String,
    pub ok: bool,
    pub parsed: Option<ParsedSignal>,
    pub error: Option<String>,
}

impl ParsedResponse {
    pub fn success(provider_id: &str, raw: String, parsed: ParsedSignal) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            raw,
            ok: true,
            parsed: Some(parsed),
            error: None,
        }
    }

    pub fn failure(provider_id: &str, raw: String, error: String) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            raw,
            ok: false,
            parsed: None,
            error: Some(error),
        }
    }

    /// Whether this response carries a usable signal for aggregation.
    pub fn is_usable(&self) -> bool {
        self.ok && self.parsed.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    New,
}

/// Derived risk figures for a final signal. Money values are 2 dp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskMetrics {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub risk_reward_ratio: Decimal,
    pub position_size_percent: Decimal,
}

/// The consensus decision for one orchestration run.
///
/// Ownership passes to the persistence collaborator immediately after
/// creation; the engine never mutates a stored signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalSignal {
    pub id: Uuid,
    pub symbol: String,
    pub signal_type: SignalType,
    /// 0 to 100, rounded to an integer.
    pub confidence: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub risk_metrics: RiskMetrics,
    /// Concatenation of the winning group's rationales.
    pub reasoning: String,
    pub status: SignalStatus,
    /// Provider ids of the winning vote group.
    pub contributors: Vec<String>,
}

/// A past signal rendered into the outbound prompt as one bullet line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalSignal {
    pub date: DateTime<Utc>,
    pub signal_type: SignalType,
    pub price: Decimal,
    pub trend_context: String,
    pub outcome: Option<String>,
    pub pnl_percent: Option<Decimal>,
}

impl HistoricalSignal {
    pub fn render_bullet(&self) -> String {
        let mut line = format!(
            "{}: {} @ {} ({})",
            self.date.format("%Y-%m-%d"),
            self.signal_type.as_str(),
            self.price,
            self.trend_context
        );
        if let Some(outcome) = &self.outcome {
            line.push_str(&format!(", outcome: {outcome}"));
        }
        if let Some(pnl) = self.pnl_percent {
            line.push_str(&format!(", PnL: {pnl}%"));
        }
        line
    }
}

impl From<&FinalSignal> for HistoricalSignal {
    fn from(signal: &FinalSignal) -> Self {
        // Reasoning strings can be long; keep the bullet readable.
        let mut trend_context: String = signal.reasoning.chars().take(80).collect();
        if signal.reasoning.chars().count() > 80 {
            trend_context.push('…');
        }
        Self {
            date: signal.timestamp,
            signal_type: signal.signal_type,
            price: signal.price,
            trend_context,
            outcome: None,
            pnl_percent: None,
        }
    }
}
