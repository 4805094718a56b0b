use chrono::Utc;
use quorum_models::{FinalSignal, RiskMetrics, SignalStatus};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::aggregate::Consensus;

/// Visible separator between contributing rationales.
const REASONING_SEPARATOR: &str = " | ";
/// Marker for a winning-group member that gave no rationale.
const NO_REASONING: &str = "no reasoning provided";

/// Combine the winning vote group with derived risk metrics into the final
/// output record. Ownership of the result passes to the persistence
/// collaborator immediately after creation.
pub fn assemble(symbol: &str, consensus: &Consensus, position_size_percent: Decimal) -> FinalSignal {
    let reasoning = consensus
        .members
        .iter()
        .map(|m| {
            m.signal
                .reasoning
                .clone()
                .unwrap_or_else(|| NO_REASONING.to_string())
        })
        .collect::<Vec<_>>()
        .join(REASONING_SEPARATOR);

    FinalSignal {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        signal_type: consensus.signal_type,
        confidence: consensus.confidence,
        price: consensus.price,
        timestamp: Utc::now(),
        risk_metrics: RiskMetrics {
            stop_loss: consensus.stop_loss,
            take_profit: consensus.take_profit,
            risk_reward_ratio: risk_reward_ratio(
                consensus.price,
                consensus.stop_loss,
                consensus.take_profit,
            ),
            position_size_percent,
        },
        reasoning,
        status: SignalStatus::New,
        contributors: consensus
            .members
            .iter()
            .map(|m| m.provider_id.clone())
            .collect(),
    }
}

/// `|take_profit - price| / |price - stop_loss|`, 2 dp. Zero unless all
/// three inputs are non-zero and the denominator is non-zero.
pub fn risk_reward_ratio(price: Decimal, stop_loss: Decimal, take_profit: Decimal) -> Decimal {
    if price.is_zero() || stop_loss.is_zero() || take_profit.is_zero() {
        return Decimal::ZERO;
    }
    let risk = (price - stop_loss).abs();
    if risk.is_zero() {
        return Decimal::ZERO;
    }
    let reward = (take_profit - price).abs();
    (reward / risk).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
