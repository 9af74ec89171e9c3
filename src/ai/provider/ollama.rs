//! Ollama Local LLM Provider
//!
//! Available when the local endpoint answers `/api/tags`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{LlmProvider, ProviderConfig, status_error, transport_error};
use crate::constants::llm as llm_constants;
use crate::types::{LensError, Result};

/// Ollama Local LLM Provider
#[derive(Debug)]
pub struct OllamaProvider {
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_base = config
            .api_base
            .unwrap_or_else(|| llm_constants::OLLAMA_API_BASE.to_string());

        // Validate endpoint URL (SSRF prevention)
        let api_base = Self::validate_endpoint(&api_base)?;

        let model = config
            .model
            .unwrap_or_else(|| llm_constants::OLLAMA_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            model,
            client,
        })
    }

    /// Only allows http/https schemes and warns for non-localhost endpoints.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            LensError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(LensError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "[::1]")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn build_request(&self, prompt: &str, max_tokens: u32, temperature: f32) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature,
                num_predict: max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        info!(model = %self.model, temperature, "Completing with Ollama");

        let start_time = Instant::now();
        let request = self.build_request(prompt, max_tokens, temperature);
        let url = format!("{}/api/generate", self.api_base);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let mut labeled = transport_error(self.name(), &e);
                if e.is_connect() {
                    labeled.message = format!(
                        "cannot reach Ollama at {} (is `ollama serve` running?): {}",
                        self.api_base, labeled.message
                    );
                }
                labeled
            })?;

        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await.into());
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| transport_error(self.name(), &e))?;

        debug!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            eval_count = body.eval_count.unwrap_or(0),
            "Ollama completion received"
        );
        Ok(body.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.api_base);
        let check = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(llm_constants::AVAILABILITY_TIMEOUT_SECS))
            .send()
            .await;

        match check {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Ollama availability check failed: {}", resp.status());
                false
            }
            Err(e) => {
                debug!("Ollama not reachable: {}", e);
                false
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProviderConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };

        let provider = OllamaProvider::new(config).expect("Failed to create provider");
        assert_eq!(provider.api_base, llm_constants::OLLAMA_API_BASE);
        assert_eq!(provider.model, llm_constants::OLLAMA_MODEL);
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config = ProviderConfig {
            provider: "ollama".to_string(),
            api_base: Some("file:///etc/passwd".to_string()),
            ..Default::default()
        };
        assert!(matches!(OllamaProvider::new(config), Err(LensError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_labeled_network() {
        let provider = OllamaProvider::new(ProviderConfig {
            provider: "ollama".to_string(),
            api_base: Some("http://127.0.0.1:9".to_string()),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap();

        match provider.complete("p", 10, 0.3).await {
            Err(LensError::Llm(err)) => {
                assert_eq!(err.category, crate::types::ErrorCategory::Network);
                assert!(err.message.contains("ollama serve"));
            }
            other => panic!("expected labeled network error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_request_carries_token_limit() {
        let provider = OllamaProvider::new(ProviderConfig::default()).unwrap();
        let json = serde_json::to_value(provider.build_request("p", 3000, 0.3)).unwrap();
        assert_eq!(json["options"]["num_predict"], 3000);
        assert_eq!(json["stream"], false);
    }
}
