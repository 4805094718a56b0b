use quorum_models::HistoricalSignal;

/// Response schema the providers are instructed to follow.
fn response_schema() -> String {
    let example = serde_json::json!({
        "type": "BUY | SELL | HOLD",
        "confidence": 75,
        "price": 100.0,
        "stopLoss": 95.0,
        "takeProfit": 110.0,
        "reasoning": "<concise justification>"
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

/// Build the outbound prompt from the market context produced by the
/// technical-analysis collaborator, plus optional past signals rendered as
/// bullets.
pub fn build_signal_prompt(
    symbol: &str,
    market_context: &str,
    history: &[HistoricalSignal],
) -> String {
    let mut prompt = format!(
        "You are a trading analyst. Produce exactly one trading signal for {symbol}.\n\n\
         ## MARKET CONTEXT\n\n\
         {market_context}\n\n"
    );

    if !history.is_empty() {
        prompt.push_str("## RELEVANT PAST SIGNALS\n\n");
        for item in history {
            prompt.push_str("- ");
            prompt.push_str(&item.render_bullet());
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "You MUST respond with ONLY a JSON object matching this schema:\n\
         {}\n\n\
         The confidence field is an integer between 0 and 100. Omit any price \
         field you cannot justify from the context.",
        response_schema()
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_models::SignalType;
    use rust_decimal_macros::dec;

    #[test]
    fn context_embedded_verbatim() {
        let context = "1h: uptrend, ATR 1.2%\n4h: sideways";
        let prompt = build_signal_prompt("BTCUSDT", context, &[]);
        assert!(prompt.contains(context));
        assert!(prompt.contains("BTCUSDT"));
        assert!(!prompt.contains("RELEVANT PAST SIGNALS"));
    }

    #[test]
    fn history_rendered_as_bullets() {
        let history = vec![HistoricalSignal {
            date: "2026-08-10T12:00:00Z".parse().unwrap(),
            signal_type: SignalType::Buy,
            price: dec!(64000),
            trend_context: "strong uptrend".to_string(),
            outcome: Some("hit take profit".to_string()),
            pnl_percent: Some(dec!(2.1)),
        }];

        let prompt = build_signal_prompt("BTCUSDT", "context", &history);
        assert!(prompt.contains("## RELEVANT PAST SIGNALS"));
        assert!(prompt.contains("- 2026-08-10: BUY @ 64000"));
        assert!(prompt.contains("PnL: 2.1%"));
    }

    #[test]
    fn schema_block_present() {
        let prompt = build_signal_prompt("ETHUSDT", "context", &[]);
        assert!(prompt.contains("\"type\": \"BUY | SELL | HOLD\""));
        assert!(prompt.contains("ONLY a JSON object"));
    }
}
