use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{ModelCallError, ModelClient, ModelSettings};

/// Client against the OpenAI-compatible chat-completions contract used by
/// OpenRouter-hosted backends. One instance per model id.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenRouterClient {
    pub fn new(settings: &ModelSettings, model: &str) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("OpenRouter API key must be provided via VULNFORGE_API_KEY");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://openrouter.ai/api".to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("vulnforge/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(120)))
            .build()
            .context("failed to build OpenRouter HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            model: model.to_string(),
            max_retries: settings.max_retries,
        })
    }

    async fn call_once(&self, prompt: &str) -> Result<String, ModelCallError> {
        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            temperature: 0.7,
            max_tokens: 2000,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelCallError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ModelCallError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelCallError> {
        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            match self.call_once(prompt).await {
                Ok(content) => {
                    debug!(model = %self.model, attempt, "model call succeeded");
                    return Ok(content);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    warn!(model = %self.model, attempt, %err, "transient failure, retrying");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn base_settings(url: String) -> ModelSettings {
        ModelSettings {
            provider: "openrouter".into(),
            api_key: "test-key".into(),
            endpoint: Some(url),
            primary_model: "alpha/one".into(),
            secondary_model: "beta/two".into(),
            timeout_secs: Some(5),
            max_retries: 0,
        }
    }

    #[test]
    fn requires_api_key() {
        let mut settings = base_settings("http://localhost".into());
        settings.api_key = " ".into();
        assert!(OpenRouterClient::new(&settings, "alpha/one").is_err());
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn generate_parses_successful_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"choices":[{"message":{"content":"{\"policies\":[],\"recommendations\":[\"r\"]}"}}]}"#);
        });

        let client = OpenRouterClient::new(&base_settings(server.base_url()), "alpha/one").unwrap();
        let content = client.generate("prompt").await.unwrap();
        assert!(content.contains("recommendations"));
        mock.assert();
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn retries_transient_failures_then_errors() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503);
        });

        let mut settings = base_settings(server.base_url());
        settings.max_retries = 1;
        let client = OpenRouterClient::new(&settings, "alpha/one").unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, ModelCallError::Http { status: 503, .. }));
        mock.assert_hits(2);
    }

    #[tokio::test]
    #[ignore = "requires loopback networking"]
    async fn empty_body_is_surfaced_as_empty_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"choices":[{"message":{"content":""}}]}"#);
        });

        let client = OpenRouterClient::new(&base_settings(server.base_url()), "alpha/one").unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, ModelCallError::EmptyResponse));
    }
}
