use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 9_000;
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Errors found while validating provider configuration.
///
/// These are raised eagerly at load time so that a malformed spec never
/// reaches the orchestration core.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("provider id must not be empty")]
    EmptyId,

    #[error("duplicate provider id: {0}")]
    DuplicateId(String),

    #[error("invalid endpoint URL for provider {id}: {url}")]
    InvalidEndpoint { id: String, url: String },

    #[error("request template for provider {id} is not JSON-shaped: {detail}")]
    InvalidTemplate { id: String, detail: String },
}

/// Configuration for one LLM endpoint.
///
/// `headers` is an ordered list; both header values and the request template
/// may embed `{{placeholder}}` tokens resolved against secrets and contextual
/// values at call time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSpec {
    /// Unique, stable key. Also keys the provider's secrets and health record.
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// JSON-shaped body template with `{{prompt}}`, `{{model}}` and arbitrary
    /// extras. When absent, an OpenAI-style chat body is used.
    #[serde(default)]
    pub request_template: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl ProviderSpec {
    pub fn new(id: &str, endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            endpoint: endpoint.to_string(),
            model: None,
            headers: Vec::new(),
            request_template: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.id.trim().is_empty() {
            return Err(SpecError::EmptyId);
        }

        if url::Url::parse(&self.endpoint).is_err() {
            return Err(SpecError::InvalidEndpoint {
                id: self.id.clone(),
                url: self.endpoint.clone(),
            });
        }

        if let Some(template) = &self.request_template {
            // Substitute every placeholder with a neutral value; the result
            // must decode as JSON or the template can never produce a valid
            // request body.
            let probed = neutralize_placeholders(template);
            if let Err(e) = serde_json::from_str::<serde_json::Value>(&probed) {
                return Err(SpecError::InvalidTemplate {
                    id: self.id.clone(),
                    detail: e.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validate a full provider set, including id uniqueness.
    pub fn validate_all(specs: &[ProviderSpec]) -> Result<(), SpecError> {
        let mut seen = std::collections::HashSet::new();
        for spec in specs {
            spec.validate()?;
            if !seen.insert(spec.id.as_str()) {
                return Err(SpecError::DuplicateId(spec.id.clone()));
            }
        }
        Ok(())
    }
}

/// Replace every `{{...}}` token with `0`, which is valid JSON both inside a
/// string literal and in a bare value position.
fn neutralize_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("}}") {
            Some(end) => {
                out.push('0');
                rest = &rest[start + 2 + end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied_on_deserialize() {
        let spec: ProviderSpec = serde_json::from_str(
            r#"{"id": "openai", "endpoint": "https://api.openai.com/v1/chat/completions"}"#,
        )
        .unwrap();
        assert_eq!(spec.timeout_ms, 9_000);
        assert_eq!(spec.max_retries, 1);
        assert!(spec.headers.is_empty());
    }

    #[test]
    fn validate_rejects_empty_id() {
        let spec = ProviderSpec::new("  ", "https://example.com");
        assert!(matches!(spec.validate(), Err(SpecError::EmptyId)));
    }

    #[test]
    fn validate_rejects_bad_url() {
        let spec = ProviderSpec::new("p1", "not a url");
        assert!(matches!(
            spec.validate(),
            Err(SpecError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_json_template() {
        let mut spec = ProviderSpec::new("p1", "https://example.com");
        spec.request_template = Some("this is not json {{prompt}}".to_string());
        assert!(matches!(
            spec.validate(),
            Err(SpecError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn validate_accepts_templated_json() {
        let mut spec = ProviderSpec::new("p1", "https://example.com");
        spec.request_template = Some(
            r#"{"model": "{{model}}", "prompt": "{{prompt}}", "temperature": {{temp}}}"#
                .to_string(),
        );
        spec.validate().unwrap();
    }

    #[test]
    fn validate_all_rejects_duplicates() {
        let specs = vec![
            ProviderSpec::new("p1", "https://a.example.com"),
            ProviderSpec::new("p1", "https://b.example.com"),
        ];
        assert!(matches!(
            ProviderSpec::validate_all(&specs),
            Err(SpecError::DuplicateId(id)) if id == "p1"
        ));
    }

    #[test]
    fn roundtrip_provider_spec() {
        let mut spec = ProviderSpec::new("anthropic", "https://api.anthropic.com/v1/messages");
        spec.model = Some("claude-3-5-haiku-latest".to_string());
        spec.headers = vec![
            ("x-api-key".to_string(), "{{API_KEY}}".to_string()),
            ("anthropic-version".to_string(), "2023-06-01".to_string()),
        ];

        let json = serde_json::to_string(&spec).unwrap();
        let deserialized: ProviderSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, deserialized);
    }
}
