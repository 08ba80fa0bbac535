use anyhow::{Context, Result};
use std::collections::HashMap;

/// Environment-driven configuration for the model backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub provider: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub primary_model: String,
    pub secondary_model: String,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl ModelSettings {
    const PROVIDER_ENV: &'static str = "VULNFORGE_PROVIDER";
    const API_KEY_ENV: &'static str = "VULNFORGE_API_KEY";
    const ENDPOINT_ENV: &'static str = "VULNFORGE_ENDPOINT";
    const PRIMARY_MODEL_ENV: &'static str = "VULNFORGE_PRIMARY_MODEL";
    const SECONDARY_MODEL_ENV: &'static str = "VULNFORGE_SECONDARY_MODEL";
    const TIMEOUT_ENV: &'static str = "VULNFORGE_TIMEOUT_SECS";
    const RETRIES_ENV: &'static str = "VULNFORGE_MAX_RETRIES";

    /// Load settings from environment variables.
    ///
    /// * `VULNFORGE_PROVIDER`: `openrouter` (default) or `noop`.
    /// * `VULNFORGE_API_KEY`: API key (required unless provider is noop).
    /// * `VULNFORGE_PRIMARY_MODEL` / `VULNFORGE_SECONDARY_MODEL`: the two
    ///   backends raced against each other.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let provider = vars
            .get(Self::PROVIDER_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "openrouter".to_string())
            .trim()
            .to_string();
        let api_key = match provider.to_lowercase().as_str() {
            "noop" => vars.get(Self::API_KEY_ENV).cloned().unwrap_or_default(),
            _ => vars
                .get(Self::API_KEY_ENV)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| {
                    format!(
                        "environment variable {} must be set for provider `{provider}`",
                        Self::API_KEY_ENV
                    )
                })?,
        };
        let endpoint = vars
            .get(Self::ENDPOINT_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let primary_model = vars
            .get(Self::PRIMARY_MODEL_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "deepseek/deepseek-r1".to_string());
        let secondary_model = vars
            .get(Self::SECONDARY_MODEL_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "meta-llama/llama-3.3-70b-instruct".to_string());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok());
        let max_retries = vars
            .get(Self::RETRIES_ENV)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(2);

        Ok(Self {
            provider,
            api_key,
            endpoint,
            primary_model,
            secondary_model,
            timeout_secs,
            max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_openrouter_with_both_models() {
        let settings =
            ModelSettings::from_map(vars(&[("VULNFORGE_API_KEY", "secret")])).unwrap();
        assert_eq!(settings.provider, "openrouter");
        assert_eq!(settings.api_key, "secret");
        assert_eq!(settings.primary_model, "deepseek/deepseek-r1");
        assert_eq!(settings.secondary_model, "meta-llama/llama-3.3-70b-instruct");
        assert_eq!(settings.max_retries, 2);
    }

    #[test]
    fn errors_when_api_key_missing() {
        let err = ModelSettings::from_map(vars(&[])).expect_err("missing key should error");
        assert!(err.to_string().contains("VULNFORGE_API_KEY"));
    }

    #[test]
    fn noop_provider_allows_missing_key() {
        let settings =
            ModelSettings::from_map(vars(&[("VULNFORGE_PROVIDER", "noop")])).unwrap();
        assert_eq!(settings.provider, "noop");
        assert!(settings.api_key.is_empty());
    }

    #[test]
    fn parses_timeout_retries_and_model_overrides() {
        let settings = ModelSettings::from_map(vars(&[
            ("VULNFORGE_API_KEY", "secret"),
            ("VULNFORGE_PRIMARY_MODEL", "alpha/one"),
            ("VULNFORGE_SECONDARY_MODEL", "beta/two"),
            ("VULNFORGE_TIMEOUT_SECS", "45"),
            ("VULNFORGE_MAX_RETRIES", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.primary_model, "alpha/one");
        assert_eq!(settings.secondary_model, "beta/two");
        assert_eq!(settings.timeout_secs, Some(45));
        assert_eq!(settings.max_retries, 5);
    }
}
