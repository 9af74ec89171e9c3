//! OpenRouter Provider
//!
//! OpenAI-compatible Chat Completions endpoint. Available only when an API key
//! is configured.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{LlmProvider, ProviderConfig, status_error, transport_error};
use crate::constants::llm as llm_constants;
use crate::types::{ErrorCategory, LensError, LlmError, Result};

const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
const SYSTEM_PROMPT: &str = "You are a BPMN process analysis expert. Always respond with valid JSON.";

/// OpenRouter provider with secure API key handling
pub struct OpenRouterProvider {
    /// Never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenRouterProvider {
    /// A missing key is not an error here: the provider reports itself
    /// unavailable and the gateway skips it.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let api_base = config
            .api_base
            .unwrap_or_else(|| llm_constants::OPENROUTER_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&api_base).map_err(|e| {
            LensError::Config(format!("Invalid OpenRouter endpoint '{}': {}", api_base, e))
        })?;

        let model = config
            .model
            .unwrap_or_else(|| llm_constants::OPENROUTER_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            api_base,
            model,
            client,
        })
    }

    fn build_request(&self, prompt: &str, max_tokens: u32, temperature: f32) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LensError::Config(format!("{} is not set", API_KEY_ENV)))?;

        info!(model = %self.model, temperature, "Completing with OpenRouter");

        let start_time = Instant::now();
        let request = self.build_request(prompt, max_tokens, temperature);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header("X-Title", "bpmn-lens")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), &e))?;

        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await.into());
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| transport_error(self.name(), &e))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                LlmError::new(
                    ErrorCategory::BadResponse,
                    self.name(),
                    "no content in completion choices",
                )
            })?;

        debug!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            chars = content.len(),
            "OpenRouter completion received"
        );
        Ok(content)
    }

    fn name(&self) -> &str {
        "openrouter"
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider: "openrouter".to_string(),
            api_key: key.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_available_with_key() {
        let provider = OpenRouterProvider::new(config(Some("sk-or-test"))).unwrap();
        assert!(provider.is_available().await);
        assert_eq!(provider.model, llm_constants::OPENROUTER_MODEL);
        assert!(!format!("{:?}", provider).contains("sk-or-test"));
    }

    #[test]
    fn test_request_shape() {
        let provider = OpenRouterProvider::new(config(Some("k"))).unwrap();
        let request = provider.build_request("analyze", 3000, 0.3);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 3000);
        assert_eq!(json["messages"][1]["content"], "analyze");
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn test_invalid_endpoint() {
        let cfg = ProviderConfig {
            api_base: Some("not a url".to_string()),
            ..config(Some("k"))
        };
        assert!(matches!(OpenRouterProvider::new(cfg), Err(LensError::Config(_))));
    }
}
