//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Provider gateway constants
pub mod gateway {
    /// Attempts per provider before falling through to the next one
    pub const DEFAULT_ATTEMPTS_PER_PROVIDER: u8 = 1;

    /// Base delay for exponential backoff between attempts on one provider (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Provider health breaker
pub mod breaker {
    /// Consecutive provider-down failures before the provider is benched
    pub const TRIP_AFTER: u32 = 3;

    /// Bench time before a trial call (seconds)
    pub const COOL_DOWN_SECS: u64 = 30;
}

/// LLM request constants
pub mod llm {
    /// Maximum completion tokens requested from every provider
    pub const DEFAULT_MAX_TOKENS: u32 = 3000;

    /// Sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    /// Per-attempt provider timeout (45 minutes)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 45 * 60;

    /// Timeout for availability checks
    pub const AVAILABILITY_TIMEOUT_SECS: u64 = 5;

    pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
    pub const OPENROUTER_MODEL: &str = "anthropic/claude-3-sonnet";

    pub const OLLAMA_API_BASE: &str = "http://localhost:11434";
    pub const OLLAMA_MODEL: &str = "llama3.1:8b";
}

/// Orchestrator constants
pub mod analysis {
    /// Report cache time-to-live (24 hours)
    pub const CACHE_TTL_SECS: u64 = 24 * 60 * 60;

    /// Worker pool size shared by all runs
    pub const MAX_CONCURRENT_PHASES: usize = 8;

    /// Headroom over the provider chain for aggregation and scheduling
    pub const RUN_DEADLINE_SLACK_SECS: u64 = 5 * 60;

    /// Overall run deadline: both default providers timing out in turn,
    /// plus slack (95 minutes)
    pub const RUN_DEADLINE_SECS: u64 = 2 * super::llm::DEFAULT_TIMEOUT_SECS + RUN_DEADLINE_SLACK_SECS;

    /// Characters of raw model output kept in degraded-phase log lines
    pub const RAW_PREVIEW_CHARS: usize = 200;
}
