//! LLM Provider Abstraction
//!
//! Defines the [`LlmProvider`] trait: plain-text completion plus an
//! availability check. Output parsing happens downstream in the phase runner,
//! never in a provider.
//!
//! ## Modules
//!
//! - `gateway`: Ordered fallback across providers with per-attempt timeouts
//! - `health`: Per-provider breaker fed by provider-down failures

mod gateway;
mod health;
mod ollama;
mod openrouter;

pub use gateway::{GatewayAttempt, GatewayConfig, GatewayStats, ProviderGateway};
pub use health::{BreakerConfig, HealthSnapshot, HealthState, ProviderHealth};
pub use ollama::OllamaProvider;
pub use openrouter::OpenRouterProvider;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::llm as llm_constants;
use crate::types::{ErrorCategory, LensError, LlmError, Result};

/// Shared LLM provider type for concurrent access across phase tasks.
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Text-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete `prompt`, returning the raw model text.
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Provider name for logging and health-breaker keys
    fn name(&self) -> &str;

    /// Whether the provider can be tried at all (configured key, reachable
    /// endpoint). Unavailable providers are skipped without an attempt.
    async fn is_available(&self) -> bool;
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for one provider
///
/// Note: API keys are never serialized to output and are redacted in debug
/// output. Each provider converts the key to SecretString internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "openrouter", "ollama"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// HTTP client timeout in seconds
    pub timeout_secs: u64,
    /// API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: None,
            timeout_secs: llm_constants::DEFAULT_TIMEOUT_SECS,
            api_key: None,
            api_base: None,
        }
    }
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openrouter" => Ok(Arc::new(OpenRouterProvider::new(config.clone())?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.clone())?)),
        _ => Err(LensError::Config(format!(
            "Unknown provider: {}. Supported: openrouter, ollama",
            config.provider
        ))),
    }
}

// =============================================================================
// HTTP Failure Labels
// =============================================================================

/// Label a failed request by what reqwest saw go wrong.
pub(crate) fn transport_error(provider: &str, err: &reqwest::Error) -> LlmError {
    let category = if err.is_timeout() {
        ErrorCategory::Timeout
    } else if err.is_connect() {
        ErrorCategory::Network
    } else if err.is_decode() || err.is_body() {
        ErrorCategory::BadResponse
    } else if err.is_request() {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    };
    LlmError::new(category, provider, err.to_string())
}

/// Label a non-success response, keeping any `Retry-After` hint.
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let wait = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    LlmError::http(provider, status, &body).with_retry_after(wait)
}

/// Delta-seconds form only; HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
