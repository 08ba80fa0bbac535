mod openrouter;
mod settings;

use async_trait::async_trait;
use thiserror::Error;

pub use openrouter::OpenRouterClient;
pub use settings::ModelSettings;

/// Failure modes a model call surfaces to the invoker.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("model API error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model call timed out")]
    Timeout,
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl ModelCallError {
    /// Transient failures (rate limiting, 5xx, transport, timeout) are
    /// worth retrying; everything else goes straight to fallback.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(_) | Self::Timeout | Self::EmptyResponse => true,
        }
    }
}

/// Client abstraction over one model backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Backend model identifier recorded in the policy document.
    fn model_id(&self) -> &str;

    /// Issue one generation request and return the raw response text.
    async fn generate(&self, prompt: &str) -> Result<String, ModelCallError>;
}

/// Offline stand-in that returns a canned strict-JSON policy payload.
/// Used when no API credential is configured and in CLI tests.
#[derive(Debug, Clone)]
pub struct NoopModelClient {
    model_id: String,
}

impl NoopModelClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl ModelClient for NoopModelClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ModelCallError> {
        Ok(r#"{
            "policies": [
                {
                    "id": "POLICY-001",
                    "title": "Review scanner findings",
                    "description": "Offline provider; review the normalized dataset manually.",
                    "priority": "MEDIUM",
                    "actions": ["Triage findings by severity"],
                    "affected_components": ["pipeline"],
                    "sla": "7 days"
                }
            ],
            "recommendations": ["Configure a live model backend for enriched policies"]
        }"#
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        assert!(ModelCallError::Http {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(ModelCallError::Http {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(ModelCallError::Timeout.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!ModelCallError::Http {
            status: 401,
            body: "bad key".into()
        }
        .is_transient());
        assert!(!ModelCallError::Http {
            status: 400,
            body: String::new()
        }
        .is_transient());
    }

    #[tokio::test]
    async fn noop_client_returns_parseable_payload() {
        let client = NoopModelClient::new("noop/test");
        let text = client.generate("prompt").await.unwrap();
        let payload = crate::policy::extract_policy_payload(&text).unwrap();
        assert!(!payload.policies.is_empty());
    }
}
