use std::collections::HashMap;
use std::sync::Arc;

use quorum_models::ParsedResponse;
use tracing::error;

use crate::adapter::Provider;

/// Fan out to every provider concurrently and wait for all to settle.
///
/// Successes and failures are both preserved as `ParsedResponse`; output
/// order matches input adapter order regardless of completion order, and a
/// slow provider never cancels the others. No partial-result short-circuit:
/// the aggregator must see every provider's outcome.
pub async fn dispatch_all(
    providers: &[Arc<dyn Provider>],
    prompt: &str,
    extra: &HashMap<String, String>,
) -> Vec<ParsedResponse> {
    let mut handles = Vec::with_capacity(providers.len());
    for provider in providers {
        let provider = Arc::clone(provider);
        let prompt = prompt.to_string();
        let extra = extra.clone();
        let id = provider.id().to_string();
        handles.push((
            id,
            tokio::spawn(async move { provider.call(&prompt, &extra).await }),
        ));
    }

    let mut responses = Vec::with_capacity(handles.len());
    for (provider_id, handle) in handles {
        match handle.await {
            Ok(response) => responses.push(response),
            Err(e) => {
                error!(provider = %provider_id, error = %e, "Provider task panicked");
                responses.push(ParsedResponse::failure(
                    &provider_id,
                    String::new(),
                    format!("provider task failed: {e}"),
                ));
            }
        }
    }
    responses
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quorum_models::ParsedSignal;
    use std::time::Duration;

    /// Provider stub that settles after a fixed delay.
    struct DelayedProvider {
        id: String,
        delay_ms: u64,
        ok: bool,
    }

    #[async_trait]
    impl Provider for DelayedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn call(&self, _prompt: &str, _extra: &HashMap<String, String>) -> ParsedResponse {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.ok {
                ParsedResponse::success(&self.id, String::new(), ParsedSignal::default())
            } else {
                ParsedResponse::failure(&self.id, String::new(), "scripted failure".to_string())
            }
        }
    }

    fn provider(id: &str, delay_ms: u64, ok: bool) -> Arc<dyn Provider> {
        Arc::new(DelayedProvider {
            id: id.to_string(),
            delay_ms,
            ok,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn output_order_matches_input_order() {
        // The slowest provider comes first; output order must not follow
        // completion order.
        let providers = vec![
            provider("slow", 300, true),
            provider("medium", 100, false),
            provider("fast", 10, true),
        ];

        let responses = dispatch_all(&providers, "prompt", &HashMap::new()).await;
        let ids: Vec<&str> = responses.iter().map(|r| r.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "medium", "fast"]);
    }

    #[tokio::test]
    async fn failures_preserved_alongside_successes() {
        let providers = vec![provider("ok", 0, true), provider("down", 0, false)];

        let responses = dispatch_all(&providers, "prompt", &HashMap::new()).await;
        assert_eq!(responses.len(), 2);
        assert!(responses[0].ok);
        assert!(!responses[1].ok);
        assert_eq!(
            responses[1].error.as_deref(),
            Some("scripted failure")
        );
    }

    #[tokio::test]
    async fn empty_provider_list_settles_empty() {
        let responses = dispatch_all(&[], "prompt", &HashMap::new()).await;
        assert!(responses.is_empty());
    }
}
