use std::sync::OnceLock;

use quorum_models::{ParsedSignal, SignalType};
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Why a response text produced no usable signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// A JSON object was found but failed schema validation. Surfaced as a
    /// failed response and never retried; the regex fallback is not consulted.
    Schema(String),
    /// No JSON object and no fallback field matched.
    NoSignal,
}

/// Extract a structured signal candidate from provider text.
///
/// JSON first: the greedy first-`{`-to-last-`}` span, then a string-aware
/// balanced-brace scan as a second chance when the greedy span does not
/// decode. Only when no JSON object decodes at all does the regex fallback
/// run; LLM output is not guaranteed to be strict JSON and the fallback is a
/// best-effort degradation, not a primary path.
pub fn parse_signal(text: &str) -> Result<ParsedSignal, ParseFailure> {
    if let Some(value) = decode_json_candidate(text) {
        return validate_signal(&value);
    }
    regex_fallback(text).ok_or(ParseFailure::NoSignal)
}

fn decode_json_candidate(text: &str) -> Option<Value> {
    if let Some(span) = greedy_object_span(text) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Some(value);
        }
    }
    if let Some(span) = first_balanced_object(text) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return Some(value);
        }
    }
    None
}

/// Greedy span from the first `{` to the last `}`.
fn greedy_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// First balanced `{ ... }` in the text, tracking string literals and escapes
/// so braces inside strings do not affect depth.
fn first_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return start.map(|s| &text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Schema validation for a decoded JSON candidate. All fields are optional,
/// but any present field must be well-formed.
fn validate_signal(value: &Value) -> Result<ParsedSignal, ParseFailure> {
    let obj = value
        .as_object()
        .ok_or_else(|| ParseFailure::Schema("candidate is not a JSON object".to_string()))?;

    let signal_type = match obj.get("type") {
        Some(Value::Null) | None => None,
        Some(Value::String(word)) => Some(SignalType::from_word(word).ok_or_else(|| {
            ParseFailure::Schema(format!("type must be BUY, SELL or HOLD, got `{word}`"))
        })?),
        Some(other) => {
            return Err(ParseFailure::Schema(format!(
                "type must be a string, got {other}"
            )))
        }
    };

    let confidence = decimal_field(value, &["confidence"]).map_err(ParseFailure::Schema)?;
    if let Some(c) = confidence {
        if c < Decimal::ZERO || c > Decimal::from(100) {
            return Err(ParseFailure::Schema(format!(
                "confidence must be within [0, 100], got {c}"
            )));
        }
    }

    let price = positive_field(value, &["price", "entry"])?;
    let stop_loss = positive_field(value, &["stopLoss", "stop_loss"])?;
    let take_profit = positive_field(value, &["takeProfit", "take_profit"])?;

    let reasoning = obj
        .get("reasoning")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let signal = ParsedSignal {
        signal_type,
        confidence,
        price,
        stop_loss,
        take_profit,
        reasoning,
    };

    // A schema-valid object with no recognizable fields is still not a signal.
    if signal.is_empty() {
        return Err(ParseFailure::NoSignal);
    }
    Ok(signal)
}

fn positive_field(value: &Value, keys: &[&str]) -> Result<Option<Decimal>, ParseFailure> {
    let parsed = decimal_field(value, keys).map_err(ParseFailure::Schema)?;
    if let Some(d) = parsed {
        if d <= Decimal::ZERO {
            return Err(ParseFailure::Schema(format!(
                "{} must be a positive number, got {d}",
                keys[0]
            )));
        }
    }
    Ok(parsed)
}

/// Read the first present key as a Decimal. Accepts JSON numbers and numeric
/// strings (with `$` and thousands separators). Null counts as absent.
fn decimal_field(value: &Value, keys: &[&str]) -> Result<Option<Decimal>, String> {
    for key in keys {
        match value.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => {
                return n
                    .as_f64()
                    .and_then(Decimal::from_f64)
                    .map(Some)
                    .ok_or_else(|| format!("field `{key}` is not a representable number"));
            }
            Some(Value::String(s)) => {
                return parse_money(s)
                    .map(Some)
                    .ok_or_else(|| format!("field `{key}` is not numeric: `{s}`"));
            }
            Some(other) => return Err(format!("field `{key}` is not numeric: {other}")),
        }
    }
    Ok(None)
}

/// Parse a human-formatted money string: optional `$`, thousands commas,
/// tolerant of trailing punctuation.
fn parse_money(text: &str) -> Option<Decimal> {
    text.trim()
        .trim_start_matches('$')
        .trim_end_matches(['.', ','])
        .replace(',', "")
        .parse::<Decimal>()
        .ok()
}

struct FallbackPatterns {
    signal: Regex,
    confidence: Regex,
    entry: Regex,
    stop_loss: Regex,
    take_profit: Regex,
}

fn patterns() -> &'static FallbackPatterns {
    static PATTERNS: OnceLock<FallbackPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| FallbackPatterns {
        signal: Regex::new(r"(?i)\b(BUY|SELL|HOLD)\b").expect("signal regex"),
        confidence: Regex::new(r"(?i)confidence[:\s]*([0-9]{1,3})").expect("confidence regex"),
        entry: Regex::new(r"(?i)entry[:\s]*\$?([0-9,.]+)").expect("entry regex"),
        stop_loss: Regex::new(r"(?i)stop\s*loss[:\s]*\$?([0-9,.]+)").expect("stop loss regex"),
        take_profit: Regex::new(r"(?i)take\s*profit[:\s]*\$?([0-9,.]+)")
            .expect("take profit regex"),
    })
}

fn capture_money(regex: &Regex, text: &str) -> Option<Decimal> {
    regex
        .captures(text)
        .and_then(|c| parse_money(c.get(1)?.as_str()))
        .filter(|d| *d > Decimal::ZERO)
}

/// Best-effort extraction from free prose when no JSON object was found.
fn regex_fallback(text: &str) -> Option<ParsedSignal> {
    let p = patterns();

    let signal_type = p
        .signal
        .captures(text)
        .and_then(|c| SignalType::from_word(c.get(1)?.as_str()));

    let confidence = p
        .confidence
        .captures(text)
        .and_then(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .filter(|v| *v <= 100)
        .map(Decimal::from);

    let signal = ParsedSignal {
        signal_type,
        confidence,
        price: capture_money(&p.entry, text),
        stop_loss: capture_money(&p.stop_loss, text),
        take_profit: capture_money(&p.take_profit, text),
        reasoning: None,
    };

    if signal.is_empty() {
        None
    } else {
        Some(signal)
    }
}
