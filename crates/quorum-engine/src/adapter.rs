use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quorum_models::{CircuitState, ParsedResponse, ProviderSpec};
use quorum_store::SecretStore;
use serde_json::Value;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::error::ProviderError;
use crate::extract::extract_text;
use crate::http::Transport;
use crate::parser::{parse_signal, ParseFailure};
use crate::template::render;

/// Base delay for exponential retry backoff: `200ms * 2^attempt`.
const BACKOFF_BASE_MS: u64 = 200;

/// Body used when a spec carries no request template (OpenAI-style chat).
pub const DEFAULT_REQUEST_TEMPLATE: &str =
    r#"{"model":"{{model}}","messages":[{"role":"user","content":"{{prompt}}"}]}"#;

/// Uniform callable contract for one configured LLM endpoint.
///
/// `call` never fails at the type level: every outcome, including circuit
/// refusals and store errors, settles into a `ParsedResponse`.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;
    async fn call(&self, prompt: &str, extra: &HashMap<String, String>) -> ParsedResponse;
}

/// Template-driven HTTP adapter for an arbitrary LLM API.
pub struct HttpProvider {
    spec: ProviderSpec,
    secrets: Arc<dyn SecretStore>,
    breaker: CircuitBreaker,
    transport: Arc<dyn Transport>,
}

impl HttpProvider {
    pub fn new(
        spec: ProviderSpec,
        secrets: Arc<dyn SecretStore>,
        breaker: CircuitBreaker,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            spec,
            secrets,
            breaker,
            transport,
        }
    }

    /// Merge contextual values, the prompt and the secrets snapshot into one
    /// substitution map. Secrets win on key collision. The prompt is
    /// JSON-escaped because body templates are JSON-shaped strings.
    fn build_vars(
        &self,
        prompt: &str,
        extra: &HashMap<String, String>,
        secrets: HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut vars = extra.clone();
        vars.insert(
            "model".to_string(),
            self.spec.model.clone().unwrap_or_default(),
        );
        vars.insert("prompt".to_string(), json_escape(prompt));
        vars.extend(secrets);
        vars
    }

    async fn post_with_retry(
        &self,
        headers: &[(String, String)],
        body: String,
    ) -> Result<String, ProviderError> {
        let timeout = Duration::from_millis(self.spec.timeout_ms);
        let mut attempt = 0u32;
        loop {
            match self
                .transport
                .post(&self.spec.endpoint, headers, body.clone(), timeout)
                .await
            {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_retryable() && attempt < self.spec.max_retries => {
                    let delay = Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt));
                    debug!(
                        provider = %self.spec.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transport failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record_success(&self) {
        if let Err(e) = self.breaker.record_success(&self.spec.id).await {
            warn!(provider = %self.spec.id, error = %e, "Failed to record provider success");
        }
    }

    async fn record_failure(&self) {
        if let Err(e) = self.breaker.record_failure(&self.spec.id).await {
            warn!(provider = %self.spec.id, error = %e, "Failed to record provider failure");
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn id(&self) -> &str {
        &self.spec.id
    }

    async fn call(&self, prompt: &str, extra: &HashMap<String, String>) -> ParsedResponse {
        let id = self.spec.id.clone();

        // Health gate: refuse fast while the circuit is open. No network
        // call, no retry consumed.
        match self.breaker.check(&id).await {
            Ok(CircuitState::Open) => {
                debug!(provider = %id, "Skipping call, circuit open");
                let error = ProviderError::CircuitOpen {
                    provider: id.clone(),
                };
                return ParsedResponse::failure(&id, String::new(), error.to_string());
            }
            Ok(_) => {}
            Err(e) => {
                return ParsedResponse::failure(
                    &id,
                    String::new(),
                    ProviderError::from(e).to_string(),
                )
            }
        }

        // Secrets snapshot for this call.
        let secrets = match self.secrets.secrets(&id).await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                return ParsedResponse::failure(
                    &id,
                    String::new(),
                    ProviderError::from(e).to_string(),
                )
            }
        };

        let vars = self.build_vars(prompt, extra, secrets);
        let headers: Vec<(String, String)> = self
            .spec
            .headers
            .iter()
            .map(|(name, template)| (name.clone(), render(template, &vars)))
            .collect();
        let template = self
            .spec
            .request_template
            .as_deref()
            .unwrap_or(DEFAULT_REQUEST_TEMPLATE);
        let body = render(template, &vars);

        let raw = match self.post_with_retry(&headers, body).await {
            Ok(raw) => raw,
            Err(e) => {
                self.record_failure().await;
                return ParsedResponse::failure(&id, String::new(), e.to_string());
            }
        };

        // A round-trip that yields no usable structure still counts against
        // the circuit: a provider that never returns parseable output is as
        // useless as one that is down.
        let text = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|body| extract_text(&body));
        let text = match text {
            Some(text) => text,
            None => {
                self.record_failure().await;
                return ParsedResponse::failure(
                    &id,
                    raw,
                    "no text content found in provider response".to_string(),
                );
            }
        };

        match parse_signal(&text) {
            Ok(signal) => {
                self.record_success().await;
                ParsedResponse::success(&id, raw, signal)
            }
            Err(ParseFailure::Schema(detail)) => {
                warn!(provider = %id, detail = %detail, "Provider returned invalid signal schema");
                self.record_failure().await;
                ParsedResponse::failure(&id, raw, ProviderError::Schema(detail).to_string())
            }
            Err(ParseFailure::NoSignal) => {
                self.record_failure().await;
                ParsedResponse::failure(&id, raw, ProviderError::NoSignal.to_string())
            }
        }
    }
}

/// JSON string escaping without the surrounding quotes, for values that are
/// substituted into JSON-shaped templates.
fn json_escape(text: &str) -> String {
    let quoted = serde_json::to_string(text).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitBreaker;
    use crate::test_support::{chat_body, MockTransport};
    use quorum_models::{ProviderHealth, SignalType};
    use quorum_store::{HealthStore, MemoryStore};
    use rust_decimal_macros::dec;

    const ENDPOINT: &str = "https://llm.example.com/v1/chat/completions";

    fn make_provider(transport: Arc<MockTransport>, store: Arc<MemoryStore>) -> HttpProvider {
        let mut spec = ProviderSpec::new("p1", ENDPOINT);
        spec.model = Some("test-model".to_string());
        spec.headers = vec![(
            "Authorization".to_string(),
            "Bearer {{API_KEY}}".to_string(),
        )];
        let breaker = CircuitBreaker::new(Arc::clone(&store) as Arc<dyn HealthStore>, 3, 60_000);
        HttpProvider::new(spec, store, breaker, transport)
    }

    #[tokio::test]
    async fn successful_call_parses_signal_and_resets_health() {
        let body = chat_body(r#"{"type": "BUY", "confidence": 80, "price": 100}"#);
        let transport = Arc::new(MockTransport::new().script(ENDPOINT, vec![Ok(body)]));
        let store = Arc::new(MemoryStore::default());

        let provider = make_provider(Arc::clone(&transport), Arc::clone(&store));
        let response = provider.call("prompt", &HashMap::new()).await;

        assert!(response.ok);
        let parsed = response.parsed.unwrap();
        assert_eq!(parsed.signal_type, Some(SignalType::Buy));
        assert_eq!(parsed.confidence, Some(dec!(80)));
        assert_eq!(transport.calls(), 1);

        let health = HealthStore::get(store.as_ref(), "p1").await.unwrap().unwrap();
        assert_eq!(health.failure_count, 0);
    }

    #[tokio::test]
    async fn circuit_open_refuses_without_network() {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryStore::default());

        let mut health = ProviderHealth::new("p1");
        health.state = quorum_models::CircuitState::Open;
        health.failure_count = 3;
        store.put(&health).await.unwrap();

        let provider = make_provider(Arc::clone(&transport), store);
        let response = provider.call("prompt", &HashMap::new()).await;

        assert!(!response.ok);
        assert!(response
            .error
            .unwrap()
            .contains("Circuit breaker is open"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_retried_with_backoff() {
        let body = chat_body(r#"{"type": "HOLD", "confidence": 55}"#);
        let transport = Arc::new(MockTransport::new().script(
            ENDPOINT,
            vec![
                Err(ProviderError::Transport("connection reset".to_string())),
                Err(ProviderError::Timeout(9_000)),
                Ok(body),
            ],
        ));
        let store = Arc::new(MemoryStore::default());

        let mut provider = make_provider(Arc::clone(&transport), store);
        provider.spec.max_retries = 2;

        let response = provider.call("prompt", &HashMap::new()).await;
        assert!(response.ok);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_count_as_failure() {
        let transport = Arc::new(MockTransport::new().script(
            ENDPOINT,
            vec![
                Err(ProviderError::Transport("down".to_string())),
                Err(ProviderError::Transport("still down".to_string())),
            ],
        ));
        let store = Arc::new(MemoryStore::default());

        let provider = make_provider(Arc::clone(&transport), Arc::clone(&store));
        let response = provider.call("prompt", &HashMap::new()).await;

        assert!(!response.ok);
        assert!(response.error.unwrap().contains("still down"));
        assert_eq!(transport.calls(), 2); // initial attempt + max_retries=1

        let health = HealthStore::get(store.as_ref(), "p1").await.unwrap().unwrap();
        assert_eq!(health.failure_count, 1);
    }

    #[tokio::test]
    async fn schema_failure_is_not_retried() {
        let body = chat_body(r#"{"type": "LONG", "confidence": 80}"#);
        let transport = Arc::new(MockTransport::new().script(ENDPOINT, vec![Ok(body)]));
        let store = Arc::new(MemoryStore::default());

        let mut provider = make_provider(Arc::clone(&transport), Arc::clone(&store));
        provider.spec.max_retries = 3;

        let response = provider.call("prompt", &HashMap::new()).await;
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("invalid response schema"));
        assert_eq!(transport.calls(), 1);

        let health = HealthStore::get(store.as_ref(), "p1").await.unwrap().unwrap();
        assert_eq!(health.failure_count, 1);
    }

    #[tokio::test]
    async fn non_json_body_is_no_text_failure() {
        let transport = Arc::new(
            MockTransport::new().script(ENDPOINT, vec![Ok("<html>gateway</html>".to_string())]),
        );
        let store = Arc::new(MemoryStore::default());

        let provider = make_provider(Arc::clone(&transport), store);
        let response = provider.call("prompt", &HashMap::new()).await;

        assert!(!response.ok);
        assert!(response.error.unwrap().contains("no text content"));
        assert_eq!(response.raw, "<html>gateway</html>");
    }

    #[tokio::test]
    async fn headers_rendered_with_secrets() {
        let body = chat_body(r#"{"type": "BUY", "confidence": 70}"#);
        let transport = Arc::new(MockTransport::new().script(ENDPOINT, vec![Ok(body)]));
        let store = Arc::new(MemoryStore::default());
        store
            .set_secrets(
                "p1",
                HashMap::from([("API_KEY".to_string(), "sk-secret".to_string())]),
            )
            .await;

        let provider = make_provider(Arc::clone(&transport), store);
        let response = provider.call("prompt", &HashMap::new()).await;
        assert!(response.ok);

        let (headers, request_body) = transport.last_request().unwrap();
        assert_eq!(headers[0].1, "Bearer sk-secret");
        assert!(request_body.contains("\"model\":\"test-model\""));
    }

    #[tokio::test]
    async fn prompt_is_json_escaped_in_body() {
        let body = chat_body(r#"{"type": "BUY", "confidence": 70}"#);
        let transport = Arc::new(MockTransport::new().script(ENDPOINT, vec![Ok(body)]));
        let store = Arc::new(MemoryStore::default());

        let provider = make_provider(Arc::clone(&transport), store);
        let prompt = "line one\nsays \"buy\"";
        let response = provider.call(prompt, &HashMap::new()).await;
        assert!(response.ok);

        let (_, request_body) = transport.last_request().unwrap();
        // The rendered body must still be valid JSON despite the newline
        // and quotes in the prompt.
        let value: Value = serde_json::from_str(&request_body).unwrap();
        assert_eq!(
            value["messages"][0]["content"].as_str().unwrap(),
            prompt
        );
    }

    #[test]
    fn json_escape_handles_quotes_and_newlines() {
        assert_eq!(json_escape("a\"b\nc"), "a\\\"b\\nc");
        assert_eq!(json_escape("plain"), "plain");
    }
}
