//! Configuration Types
//!
//! All configuration structures with defaults matching `crate::constants`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ai::{GatewayConfig, ProviderConfig};
use crate::analysis::OrchestratorConfig;
use crate::constants::{analysis as analysis_constants, gateway as gateway_constants, llm as llm_constants};
use crate::types::{LensError, PhaseSet, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Orchestration settings
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LensError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(LensError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(LensError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(LensError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.llm.attempts_per_provider == 0 {
            return Err(LensError::Config(
                "LLM attempts_per_provider must be at least 1".to_string(),
            ));
        }

        // Also rejects unknown provider names
        let providers = self.llm.provider_configs()?.len();
        if providers == 0 {
            return Err(LensError::Config(
                "At least one LLM provider must be configured".to_string(),
            ));
        }

        if self.analysis.max_concurrent_phases == 0 {
            return Err(LensError::Config(
                "analysis max_concurrent_phases must be greater than 0".to_string(),
            ));
        }

        if self.analysis.deadline_secs == 0 || self.analysis.cache_ttl_secs == 0 {
            return Err(LensError::Config(
                "analysis deadline_secs and cache_ttl_secs must be greater than 0".to_string(),
            ));
        }

        // A run deadline inside the provider chain cuts off fallback
        let chain_secs = self.llm.worst_case_call().as_secs();
        if self.analysis.deadline_secs <= chain_secs {
            return Err(LensError::Config(format!(
                "analysis deadline_secs ({}) must exceed the provider chain's worst case of {}s \
                 ({} providers x {} attempts x {}s timeout); raise the deadline or lower llm.timeout_secs",
                self.analysis.deadline_secs,
                chain_secs,
                providers,
                self.llm.attempts_per_provider,
                self.llm.timeout_secs
            )));
        }

        self.analysis.phase_set()?;
        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Providers in fallback order
    pub providers: Vec<String>,

    pub openrouter: ProviderSettings,

    pub ollama: ProviderSettings,

    /// Completion limit per request
    pub max_tokens: u32,

    pub temperature: f32,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Attempts on one provider before falling through to the next
    pub attempts_per_provider: u8,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: vec!["openrouter".to_string(), "ollama".to_string()],
            openrouter: ProviderSettings::default(),
            ollama: ProviderSettings::default(),
            max_tokens: llm_constants::DEFAULT_MAX_TOKENS,
            temperature: llm_constants::DEFAULT_TEMPERATURE,
            timeout_secs: llm_constants::DEFAULT_TIMEOUT_SECS,
            attempts_per_provider: gateway_constants::DEFAULT_ATTEMPTS_PER_PROVIDER,
        }
    }
}

impl LlmConfig {
    /// Provider configs in fallback order.
    pub fn provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        self.providers
            .iter()
            .map(|name| {
                let settings = match name.as_str() {
                    "openrouter" => &self.openrouter,
                    "ollama" => &self.ollama,
                    other => {
                        return Err(LensError::Config(format!(
                            "Unknown provider: {}. Supported: openrouter, ollama",
                            other
                        )));
                    }
                };
                Ok(ProviderConfig {
                    provider: name.clone(),
                    model: settings.model.clone(),
                    timeout_secs: self.timeout_secs,
                    api_key: settings.api_key.clone(),
                    api_base: settings.api_base.clone(),
                })
            })
            .collect()
    }

    /// Every provider using every attempt to the full timeout, with the
    /// capped backoff between attempts.
    pub fn worst_case_call(&self) -> Duration {
        let providers = self.providers.len().max(1) as u64;
        let attempts = u64::from(self.attempts_per_provider.max(1));
        let per_provider = self
            .timeout_secs
            .saturating_mul(attempts)
            .saturating_add(gateway_constants::MAX_DELAY_SECS.saturating_mul(attempts - 1));
        Duration::from_secs(per_provider.saturating_mul(providers))
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            per_attempt_timeout: Duration::from_secs(self.timeout_secs),
            attempts_per_provider: self.attempts_per_provider,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            ..Default::default()
        }
    }
}

/// Per-provider overrides
///
/// Note: `api_key` is accepted from files and env but never written back out.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// =============================================================================
// Analysis Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Phase names; LOGIC and VALIDATION are opt-in
    pub phases: Vec<String>,

    /// Report cache lifetime in seconds
    pub cache_ttl_secs: u64,

    /// Worker pool size shared by all runs
    pub max_concurrent_phases: usize,

    /// Default deadline for a whole run in seconds
    pub deadline_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            phases: PhaseSet::canonical()
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            cache_ttl_secs: analysis_constants::CACHE_TTL_SECS,
            max_concurrent_phases: analysis_constants::MAX_CONCURRENT_PHASES,
            deadline_secs: analysis_constants::RUN_DEADLINE_SECS,
        }
    }
}

impl AnalysisConfig {
    pub fn phase_set(&self) -> Result<PhaseSet> {
        PhaseSet::parse_names(&self.phases)
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig> {
        Ok(OrchestratorConfig {
            phases: self.phase_set()?,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            max_concurrent_phases: self.max_concurrent_phases,
            run_deadline: Duration::from_secs(self.deadline_secs),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalysisPhase;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.providers, vec!["openrouter", "ollama"]);
        assert_eq!(config.llm.max_tokens, 3000);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_phases_are_canonical() {
        let phases = AnalysisConfig::default().phase_set().unwrap();
        assert_eq!(phases, PhaseSet::canonical());
        assert!(!phases.contains(AnalysisPhase::Logic));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.max_concurrent_phases = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.phases = vec!["STRUCTURE".to_string(), "VIBES".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.providers = vec!["carrier-pigeon".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.providers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadline_must_outlast_provider_chain() {
        let mut config = Config::default();
        // Two providers x 45 min
        config.analysis.deadline_secs = 2 * llm_constants::DEFAULT_TIMEOUT_SECS;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("deadline_secs"), "{}", err);

        config.analysis.deadline_secs += 1;
        config.validate().unwrap();

        // Extra attempts widen the chain by their timeout plus backoff
        config.llm.attempts_per_provider = 2;
        assert!(config.validate().is_err());
        assert_eq!(
            config.llm.worst_case_call(),
            Duration::from_secs(2 * (2 * llm_constants::DEFAULT_TIMEOUT_SECS + gateway_constants::MAX_DELAY_SECS))
        );

        let mut single = Config::default();
        single.llm.providers = vec!["ollama".to_string()];
        single.llm.timeout_secs = 60;
        single.analysis.deadline_secs = 61;
        single.validate().unwrap();
    }

    #[test]
    fn test_default_deadline_covers_both_default_providers() {
        let config = Config::default();
        assert!(config.analysis.deadline_secs > config.llm.worst_case_call().as_secs());
        assert_eq!(
            config.analysis.deadline_secs,
            config.llm.worst_case_call().as_secs() + analysis_constants::RUN_DEADLINE_SLACK_SECS
        );
    }

    #[test]
    fn test_provider_configs_follow_order() {
        let mut llm = LlmConfig {
            providers: vec!["ollama".to_string(), "openrouter".to_string()],
            ..Default::default()
        };
        llm.ollama.model = Some("mistral".to_string());

        let configs = llm.provider_configs().unwrap();
        assert_eq!(configs[0].provider, "ollama");
        assert_eq!(configs[0].model.as_deref(), Some("mistral"));
        assert_eq!(configs[1].provider, "openrouter");
        assert_eq!(configs[1].timeout_secs, llm.timeout_secs);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = Config::default();
        config.llm.openrouter.api_key = Some("sk-or-secret".to_string());

        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(!toml.contains("sk-or-secret"));
        assert!(!format!("{:?}", config).contains("sk-or-secret"));
    }

    #[test]
    fn test_gateway_config_carries_request_params() {
        let llm = LlmConfig {
            timeout_secs: 90,
            temperature: 0.5,
            ..Default::default()
        };
        let gateway = llm.gateway_config();
        assert_eq!(gateway.per_attempt_timeout, Duration::from_secs(90));
        assert_eq!(gateway.temperature, 0.5);
        assert_eq!(gateway.max_tokens, 3000);
    }
}
