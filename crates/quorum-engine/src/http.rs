use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::ProviderError;

/// Seam between the adapter and the network. Mockable for testing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a rendered body to a provider endpoint. `Content-Type:
    /// application/json` is always set; rendered headers are applied in order.
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
        timeout: Duration,
    ) -> Result<String, ProviderError>;
}

/// reqwest-backed transport used in production.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(name, value);
        }

        debug!(%url, "Sending provider request");
        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout.as_millis() as u64)
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(ProviderError::Transport(format!("HTTP {status}: {snippet}")));
        }

        Ok(text)
    }
}
