//! Crate error type and provider failure categories
//!
//! Provider adapters label their own failures with an [`ErrorCategory`]
//! where the cause is known (transport error kind, HTTP status). The gateway
//! reads the category to decide two things independently: whether to try the
//! same provider again, and whether the failure says the provider is down.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::utils::preview;

// =============================================================================
// Failure Categories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 429, or a throttling message
    RateLimit,
    /// Missing or rejected credentials (401/403)
    Auth,
    /// Connection refused, reset, DNS
    Network,
    /// No answer within the attempt's time slot
    Timeout,
    /// Endpoint or model not there (404, 503)
    Unavailable,
    /// Server-side 5xx other than 503
    Transient,
    /// The request itself was rejected (400, 413, 422)
    BadRequest,
    /// The provider answered with a body we could not read
    BadResponse,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::Auth => "AUTH",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Transient => "TRANSIENT",
            Self::BadRequest => "BAD_REQUEST",
            Self::BadResponse => "BAD_RESPONSE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Worth another attempt on the same provider.
    ///
    /// Timeouts are not: one attempt already used its whole time slot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::BadResponse | Self::Unknown
        )
    }

    /// Counts against the provider's health breaker.
    ///
    /// Throttling and rejected or garbled payloads mean the provider is up.
    pub fn trips_breaker(&self) -> bool {
        matches!(
            self,
            Self::Auth | Self::Network | Self::Timeout | Self::Unavailable | Self::Transient
        )
    }

    /// Category for a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            401 | 403 => Self::Auth,
            404 | 503 => Self::Unavailable,
            408 | 504 => Self::Timeout,
            400 | 413 | 422 => Self::BadRequest,
            500..=599 => Self::Transient,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Provider Failure
// =============================================================================

/// A failed provider call, labeled at the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub provider: String,
    pub message: String,
    /// Server-requested wait (`Retry-After`)
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn new(
        category: ErrorCategory,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            provider: provider.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Non-success HTTP response. The body is kept short; some providers
    /// echo the whole prompt back in error payloads.
    pub fn http(provider: impl Into<String>, status: u16, body: &str) -> Self {
        Self::new(
            ErrorCategory::from_status(status),
            provider,
            format!("HTTP {}: {}", status, preview(body.trim(), 300)),
        )
    }

    pub fn with_retry_after(mut self, wait: Option<Duration>) -> Self {
        self.retry_after = wait;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.category, self.message)
    }
}

impl std::error::Error for LlmError {}

// =============================================================================
// Classification
// =============================================================================

/// Maps any crate error raised during a provider call onto a category.
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify_error(err: &LensError, provider: &str) -> LlmError {
        match err {
            LensError::Llm(labeled) => labeled.clone(),
            LensError::Timeout { .. } => {
                LlmError::new(ErrorCategory::Timeout, provider, err.to_string())
            }
            LensError::Json(_) => {
                LlmError::new(ErrorCategory::BadResponse, provider, err.to_string())
            }
            // Missing key or unusable endpoint: retrying cannot help
            LensError::Config(_) => LlmError::new(ErrorCategory::Auth, provider, err.to_string()),
            LensError::LlmApi(msg) => Self::classify_message(msg, provider),
            other => Self::classify_message(&other.to_string(), provider),
        }
    }

    /// Fallback for providers that fail with free text instead of a
    /// labeled [`LlmError`].
    pub fn classify_message(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        let category = if has(&["rate limit", "too many requests", "429"]) {
            ErrorCategory::RateLimit
        } else if has(&["api key", "unauthorized", "forbidden", "401", "403"]) {
            ErrorCategory::Auth
        } else if has(&["connect", "connection", "dns"]) {
            ErrorCategory::Network
        } else if has(&["timed out", "timeout"]) {
            ErrorCategory::Timeout
        } else if has(&["unavailable", "model not found", "503"]) {
            ErrorCategory::Unavailable
        } else {
            ErrorCategory::Unknown
        };
        LlmError::new(category, provider, message)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Unlabeled provider failure
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Every configured provider was skipped or failed
    #[error("All providers exhausted for {phase}: {}", .failures.join("; "))]
    ProvidersExhausted { phase: String, failures: Vec<String> },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("No JSON found in model output: {0}")]
    Extraction(String),

    #[error("Cannot decode {phase} output: {message}")]
    Decode { phase: String, message: String },

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LensError>;

impl LensError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn decode(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            phase: phase.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
