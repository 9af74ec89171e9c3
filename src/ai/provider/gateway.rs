//! Provider Gateway
//!
//! Ordered fallback across LLM providers. The first provider that returns
//! text wins; providers after the winner are never attempted.
//!
//! ## Strategy
//!
//! 1. Skip providers that report unavailable or whose health breaker is tripped
//! 2. Attempt the provider under the per-attempt timeout
//! 3. Label the outcome and feed it to the provider's breaker
//! 4. Retry the same provider only for retryable categories with attempts left
//! 5. Otherwise fall through to the next provider
//! 6. Nothing left: `ProvidersExhausted` with every provider's failure

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::health::{BreakerConfig, HealthSnapshot, HealthState, ProviderHealth};
use super::{ProviderConfig, SharedProvider};
use crate::ai::timeout::with_timeout;
use crate::constants::{gateway as gateway_constants, llm as llm_constants};
use crate::types::{ErrorCategory, ErrorClassifier, LensError, Result};

/// Gateway tuning
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upper bound on one provider attempt
    pub per_attempt_timeout: Duration,
    /// Attempts on one provider before falling through
    pub attempts_per_provider: u8,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
    /// Completion limit passed to every provider
    pub max_tokens: u32,
    pub temperature: f32,
    pub breaker: BreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_secs(llm_constants::DEFAULT_TIMEOUT_SECS),
            attempts_per_provider: gateway_constants::DEFAULT_ATTEMPTS_PER_PROVIDER,
            base_delay: Duration::from_millis(gateway_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(gateway_constants::MAX_DELAY_SECS),
            backoff_factor: gateway_constants::BACKOFF_FACTOR,
            max_tokens: llm_constants::DEFAULT_MAX_TOKENS,
            temperature: llm_constants::DEFAULT_TEMPERATURE,
            breaker: BreakerConfig::default(),
        }
    }
}

/// One provider attempt
#[derive(Debug, Clone)]
pub struct GatewayAttempt {
    pub provider: String,
    pub attempt: u8,
    pub success: bool,
    pub category: Option<ErrorCategory>,
    pub duration_ms: u64,
    /// Provider health right after this attempt was recorded
    pub health: HealthState,
}

/// Per-call execution record
#[derive(Debug, Default, Clone)]
pub struct GatewayStats {
    pub attempts: Vec<GatewayAttempt>,
    pub successful_provider: Option<String>,
    /// Providers skipped without an attempt (unavailable or benched)
    pub skipped: Vec<String>,
    /// The subset of `skipped` turned away by their health breaker
    pub benched: Vec<String>,
    pub total_duration_ms: u64,
}

impl GatewayStats {
    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }

    /// Providers this call left benched
    pub fn tripped(&self) -> Vec<&str> {
        let mut tripped: Vec<&str> = Vec::new();
        for attempt in &self.attempts {
            if attempt.health == HealthState::Tripped && !tripped.contains(&attempt.provider.as_str()) {
                tripped.push(&attempt.provider);
            }
        }
        tripped
    }
}

/// Ordered provider fallback with per-provider health breakers.
///
/// Cloning shares the breakers, so every clone sees the same provider
/// health.
#[derive(Clone)]
pub struct ProviderGateway {
    providers: Vec<SharedProvider>,
    config: GatewayConfig,
    health: Arc<DashMap<String, ProviderHealth>>,
}

impl ProviderGateway {
    pub fn new(providers: Vec<SharedProvider>, config: GatewayConfig) -> Self {
        let health = DashMap::new();
        for provider in &providers {
            let name = provider.name().to_string();
            health
                .entry(name.clone())
                .or_insert_with(|| ProviderHealth::new(name, config.breaker.clone()));
        }

        Self {
            providers,
            config,
            health: Arc::new(health),
        }
    }

    /// Build the ordered provider list from configs
    pub fn from_configs(configs: &[ProviderConfig], config: GatewayConfig) -> Result<Self> {
        let providers = configs
            .iter()
            .map(super::create_provider)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(providers, config))
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        self.config.per_attempt_timeout
    }

    /// Longest one `complete` call can take when every provider uses every
    /// attempt to the full timeout, backoff waits included.
    pub fn worst_case_call(&self) -> Duration {
        let providers = self.providers.len().max(1) as u32;
        let attempts = u32::from(self.config.attempts_per_provider.max(1));
        let waits = self.config.max_delay * (attempts - 1);
        (self.config.per_attempt_timeout * attempts + waits) * providers
    }

    /// Complete `prompt` with the first provider that succeeds.
    ///
    /// `phase_hint` only labels logs and the exhaustion error.
    pub async fn complete(&self, prompt: &str, phase_hint: &str) -> Result<String> {
        let (text, _stats) = self.complete_with_stats(prompt, phase_hint).await?;
        Ok(text)
    }

    #[instrument(skip(self, prompt), fields(phase = phase_hint, providers = self.providers.len()))]
    pub async fn complete_with_stats(
        &self,
        prompt: &str,
        phase_hint: &str,
    ) -> Result<(String, GatewayStats)> {
        let start = Instant::now();
        let mut stats = GatewayStats::default();
        let mut failures = Vec::new();

        for provider in &self.providers {
            let name = provider.name().to_string();

            if !provider.is_available().await {
                debug!(provider = %name, "Skipping unavailable provider");
                failures.push(format!("{}: unavailable", name));
                stats.skipped.push(name);
                continue;
            }

            let mut delay = self.config.base_delay;
            let attempts = self.config.attempts_per_provider.max(1);

            for attempt in 1..=attempts {
                if !self.admit(&name) {
                    debug!(provider = %name, "Provider benched by health breaker");
                    failures.push(format!("{}: benched", name));
                    if attempt == 1 {
                        stats.skipped.push(name.clone());
                        stats.benched.push(name.clone());
                    }
                    break;
                }

                let attempt_start = Instant::now();
                let outcome = with_timeout(
                    self.config.per_attempt_timeout,
                    provider.complete(prompt, self.config.max_tokens, self.config.temperature),
                    &format!("{} completion", name),
                )
                .await;
                let duration_ms = attempt_start.elapsed().as_millis() as u64;

                match outcome {
                    Ok(text) => {
                        let health = self.record(&name, None);
                        stats.attempts.push(GatewayAttempt {
                            provider: name.clone(),
                            attempt,
                            success: true,
                            category: None,
                            duration_ms,
                            health,
                        });
                        stats.successful_provider = Some(name);
                        stats.total_duration_ms = start.elapsed().as_millis() as u64;

                        info!(
                            provider = stats.successful_provider.as_deref().unwrap_or_default(),
                            attempts = stats.total_attempts(),
                            "Provider completion succeeded"
                        );
                        debug!(?stats, "Gateway stats");
                        return Ok((text, stats));
                    }
                    Err(err) => {
                        let classified = ErrorClassifier::classify_error(&err, &name);
                        let health = self.record(&name, Some(classified.category));
                        stats.attempts.push(GatewayAttempt {
                            provider: name.clone(),
                            attempt,
                            success: false,
                            category: Some(classified.category),
                            duration_ms,
                            health,
                        });

                        warn!(
                            provider = %name,
                            attempt,
                            category = %classified.category,
                            %health,
                            error = %err,
                            "Provider attempt failed"
                        );

                        let retry = attempt < attempts
                            && classified.is_retryable()
                            && health != HealthState::Tripped;
                        if !retry {
                            failures.push(format!("{}: {}", name, err));
                            break;
                        }

                        // Server hint first; capped so worst_case_call() holds
                        let wait = classified
                            .retry_after
                            .unwrap_or_else(|| delay + random_jitter(delay))
                            .min(self.config.max_delay);
                        debug!(provider = %name, wait_ms = wait.as_millis() as u64, "Retrying after backoff");
                        sleep(wait).await;
                        delay = calculate_backoff(delay, self.config.backoff_factor, self.config.max_delay);
                    }
                }
            }
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        debug!(?stats, "Gateway stats");

        if self.providers.is_empty() {
            failures.push("no providers configured".to_string());
        }
        warn!(phase = phase_hint, failures = failures.len(), "All providers exhausted");

        Err(LensError::ProvidersExhausted {
            phase: phase_hint.to_string(),
            failures,
        })
    }

    pub fn health_state(&self, provider_name: &str) -> Option<HealthState> {
        self.health.get(provider_name).map(|h| h.state())
    }

    /// Breaker snapshots in provider order
    pub fn health_snapshots(&self) -> Vec<HealthSnapshot> {
        self.providers
            .iter()
            .filter_map(|p| self.health.get(p.name()).map(|h| h.snapshot()))
            .collect()
    }

    pub fn reset_health(&self) {
        for entry in self.health.iter() {
            entry.value().reset();
        }
    }

    fn admit(&self, provider_name: &str) -> bool {
        self.health
            .get(provider_name)
            .map(|h| h.try_acquire())
            .unwrap_or(true)
    }

    fn record(&self, provider_name: &str, failure: Option<ErrorCategory>) -> HealthState {
        self.health
            .get(provider_name)
            .map(|h| h.record(failure))
            .unwrap_or(HealthState::Healthy)
    }
}

/// Up to a quarter of `base_delay`
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}

fn calculate_backoff(current: Duration, factor: f32, max: Duration) -> Duration {
    current.mul_f32(factor).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::LlmProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Step {
        Reply(&'static str),
        Fail(&'static str),
        Hang,
    }

    struct ScriptedProvider {
        name: &'static str,
        available: bool,
        script: Vec<Step>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, script: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: true,
                script,
                calls: AtomicUsize::new(0),
            })
        }

        fn unavailable(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: false,
                script: vec![Step::Reply("never")],
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script[n.min(self.script.len() - 1)].clone();
            match step {
                Step::Reply(text) => Ok(text.to_string()),
                Step::Fail(msg) => Err(LensError::LlmApi(msg.to_string())),
                Step::Hang => {
                    sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }

        fn name(&self) -> &str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }
    }

    fn gateway(providers: Vec<Arc<ScriptedProvider>>, config: GatewayConfig) -> ProviderGateway {
        let shared: Vec<SharedProvider> = providers
            .into_iter()
            .map(|p| p as SharedProvider)
            .collect();
        ProviderGateway::new(shared, config)
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let a = ScriptedProvider::new("a", vec![Step::Reply("from a")]);
        let b = ScriptedProvider::new("b", vec![Step::Reply("from b")]);
        let gw = gateway(vec![a.clone(), b.clone()], GatewayConfig::default());

        assert_eq!(gw.complete("p", "STRUCTURE").await.unwrap(), "from a");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_in_order() {
        let a = ScriptedProvider::new("a", vec![Step::Fail("invalid api key")]);
        let b = ScriptedProvider::new("b", vec![Step::Reply("from b")]);
        let c = ScriptedProvider::new("c", vec![Step::Reply("from c")]);
        let gw = gateway(vec![a.clone(), b.clone(), c.clone()], GatewayConfig::default());

        let (text, stats) = gw.complete_with_stats("p", "SECURITY").await.unwrap();
        assert_eq!(text, "from b");
        assert_eq!(stats.successful_provider.as_deref(), Some("b"));
        assert_eq!(stats.total_attempts(), 2);
        assert_eq!(stats.attempts[0].category, Some(ErrorCategory::Auth));
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_provider_skipped() {
        let a = ScriptedProvider::unavailable("a");
        let b = ScriptedProvider::new("b", vec![Step::Reply("ok")]);
        let gw = gateway(vec![a.clone(), b], GatewayConfig::default());

        let (text, stats) = gw.complete_with_stats("p", "STRUCTURE").await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(a.calls(), 0);
        assert_eq!(stats.skipped, vec!["a".to_string()]);
        assert_eq!(stats.total_attempts(), 1);
    }

    #[tokio::test]
    async fn test_all_fail_reports_every_provider() {
        let a = ScriptedProvider::new("a", vec![Step::Fail("invalid api key")]);
        let b = ScriptedProvider::unavailable("b");
        let gw = gateway(vec![a, b], GatewayConfig::default());

        match gw.complete("p", "PERFORMANCE").await {
            Err(LensError::ProvidersExhausted { phase, failures }) => {
                assert_eq!(phase, "PERFORMANCE");
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("a:"));
                assert_eq!(failures[1], "b: unavailable");
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_gateway_is_exhausted() {
        let gw = gateway(Vec::new(), GatewayConfig::default());
        assert!(matches!(
            gw.complete("p", "STRUCTURE").await,
            Err(LensError::ProvidersExhausted { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_falls_through() {
        let a = ScriptedProvider::new("a", vec![Step::Hang]);
        let b = ScriptedProvider::new("b", vec![Step::Reply("ok")]);
        let config = GatewayConfig {
            per_attempt_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let gw = gateway(vec![a.clone(), b], config);

        let (text, stats) = gw.complete_with_stats("p", "STRUCTURE").await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(a.calls(), 1);
        assert_eq!(stats.attempts[0].category, Some(ErrorCategory::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_retries_same_provider() {
        let a = ScriptedProvider::new(
            "a",
            vec![Step::Fail("connection reset by peer"), Step::Reply("second try")],
        );
        let config = GatewayConfig {
            attempts_per_provider: 2,
            ..Default::default()
        };
        let gw = gateway(vec![a.clone()], config);

        assert_eq!(gw.complete("p", "STRUCTURE").await.unwrap(), "second try");
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_moves_on() {
        let a = ScriptedProvider::new("a", vec![Step::Fail("401 unauthorized"), Step::Reply("x")]);
        let b = ScriptedProvider::new("b", vec![Step::Reply("from b")]);
        let config = GatewayConfig {
            attempts_per_provider: 3,
            ..Default::default()
        };
        let gw = gateway(vec![a.clone(), b], config);

        assert_eq!(gw.complete("p", "STRUCTURE").await.unwrap(), "from b");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tripped_provider_is_skipped() {
        let a = ScriptedProvider::new("a", vec![Step::Fail("invalid api key")]);
        let b = ScriptedProvider::new("b", vec![Step::Reply("ok")]);
        let config = GatewayConfig {
            breaker: BreakerConfig {
                trip_after: 1,
                cool_down: Duration::from_secs(600),
            },
            ..Default::default()
        };
        let gw = gateway(vec![a.clone(), b], config);

        let (_, first) = gw.complete_with_stats("p", "STRUCTURE").await.unwrap();
        assert_eq!(first.attempts[0].health, HealthState::Tripped);
        assert_eq!(first.tripped(), vec!["a"]);
        assert_eq!(gw.health_state("a"), Some(HealthState::Tripped));

        let (_, second) = gw.complete_with_stats("p", "SECURITY").await.unwrap();
        assert_eq!(a.calls(), 1);
        assert_eq!(second.skipped, vec!["a".to_string()]);
        assert_eq!(second.benched, vec!["a".to_string()]);
        assert!(second.tripped().is_empty());

        let snaps = gw.health_snapshots();
        assert_eq!(snaps[0].provider, "a");
        assert_eq!(snaps[0].trips, 1);
        assert_eq!(snaps[0].rejected, 1);
        assert_eq!(snaps[1].state, HealthState::Healthy);

        gw.reset_health();
        assert_eq!(gw.health_state("a"), Some(HealthState::Healthy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_do_not_bench_provider() {
        let a = ScriptedProvider::new("a", vec![Step::Fail("429 too many requests")]);
        let b = ScriptedProvider::new("b", vec![Step::Reply("ok")]);
        let config = GatewayConfig {
            breaker: BreakerConfig {
                trip_after: 1,
                cool_down: Duration::from_secs(600),
            },
            ..Default::default()
        };
        let gw = gateway(vec![a.clone(), b], config);

        for phase in ["STRUCTURE", "SECURITY", "PERFORMANCE"] {
            let (_, stats) = gw.complete_with_stats("p", phase).await.unwrap();
            assert_eq!(stats.attempts[0].category, Some(ErrorCategory::RateLimit));
            assert_eq!(stats.attempts[0].health, HealthState::Healthy);
            assert!(stats.benched.is_empty());
        }
        assert_eq!(a.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_benched_provider_gets_trial_after_cool_down() {
        let a = ScriptedProvider::new(
            "a",
            vec![Step::Fail("connection refused"), Step::Reply("back")],
        );
        let config = GatewayConfig {
            breaker: BreakerConfig {
                trip_after: 1,
                cool_down: Duration::from_secs(60),
            },
            ..Default::default()
        };
        let gw = gateway(vec![a.clone()], config);

        assert!(gw.complete("p", "STRUCTURE").await.is_err());
        assert!(gw.complete("p", "STRUCTURE").await.is_err());
        assert_eq!(a.calls(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(gw.complete("p", "STRUCTURE").await.unwrap(), "back");
        assert_eq!(gw.health_state("a"), Some(HealthState::Healthy));
    }

    #[test]
    fn test_worst_case_call_covers_every_attempt() {
        let providers: Vec<Arc<ScriptedProvider>> = vec![
            ScriptedProvider::new("a", vec![Step::Hang]),
            ScriptedProvider::new("b", vec![Step::Hang]),
        ];
        let config = GatewayConfig {
            per_attempt_timeout: Duration::from_secs(10),
            attempts_per_provider: 3,
            max_delay: Duration::from_secs(2),
            ..Default::default()
        };
        let gw = gateway(providers, config);
        // (3 x 10s + 2 x 2s) per provider
        assert_eq!(gw.worst_case_call(), Duration::from_secs(68));

        let single = gateway(Vec::new(), GatewayConfig::default());
        assert_eq!(
            single.worst_case_call(),
            Duration::from_secs(llm_constants::DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let max = Duration::from_secs(1);
        assert_eq!(
            calculate_backoff(Duration::from_millis(800), 2.0, max),
            max
        );
        assert!(random_jitter(Duration::from_millis(400)) < Duration::from_millis(100));
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }
}
