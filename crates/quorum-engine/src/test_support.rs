//! Test support: a scripted transport and canned provider bodies.
//!
//! Lets adapter and scenario tests exercise the full call path (health gate,
//! rendering, retry, extraction, parsing) without any network I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::http::Transport;

/// Scripted transport: pops one canned outcome per call, keyed by endpoint
/// URL. Counts calls so tests can assert how many HTTP attempts happened.
pub struct MockTransport {
    scripts: Mutex<HashMap<String, Vec<Result<String, ProviderError>>>>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(Vec<(String, String)>, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Queue outcomes for an endpoint, consumed in order.
    pub fn script(self, url: &str, outcomes: Vec<Result<String, ProviderError>>) -> Self {
        self.scripts
            .lock()
            .expect("scripts mutex")
            .insert(url.to_string(), outcomes);
        self
    }

    /// Total number of post calls made, across all endpoints.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Headers and body of the most recent post, if any.
    pub fn last_request(&self) -> Option<(Vec<(String, String)>, String)> {
        self.last_request.lock().expect("request mutex").clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("request mutex") = Some((headers.to_vec(), body));

        let mut scripts = self.scripts.lock().expect("scripts mutex");
        match scripts.get_mut(url) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => Err(ProviderError::Transport(format!(
                "no scripted response for {url}"
            ))),
        }
    }
}

/// Wrap content in an OpenAI-style chat completion envelope.
pub fn chat_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
    .to_string()
}

/// Wrap content in an Anthropic-style content-block envelope.
pub fn content_blocks_body(content: &str) -> String {
    serde_json::json!({
        "id": "msg-test",
        "content": [{"type": "text", "text": content}]
    })
    .to_string()
}

/// A JSON signal body as a well-behaved provider would return it.
pub fn signal_json(
    signal_type: &str,
    confidence: u32,
    price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
) -> String {
    let mut object = serde_json::json!({
        "type": signal_type,
        "confidence": confidence,
        "reasoning": format!("{signal_type} rationale"),
    });
    if let Some(price) = price {
        object["price"] = serde_json::json!(price);
    }
    if let Some(stop_loss) = stop_loss {
        object["stopLoss"] = serde_json::json!(stop_loss);
    }
    if let Some(take_profit) = take_profit {
        object["takeProfit"] = serde_json::json!(take_profit);
    }
    object.to_string()
}
