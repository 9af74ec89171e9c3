//! AI Integration Layer
//!
//! Prompt construction, provider fallback, and JSON extraction from model
//! output.

pub mod extract;
pub mod prompt;
pub mod provider;
pub mod timeout;

pub use extract::{Extraction, ResponseExtractor, extract_json};
pub use prompt::{PromptBuilder, PromptComposer, PromptSection, TemplatePromptBuilder};
pub use provider::{
    BreakerConfig, GatewayAttempt, GatewayConfig, GatewayStats, HealthSnapshot, HealthState,
    LlmProvider, OllamaProvider, OpenRouterProvider, ProviderConfig, ProviderGateway,
    ProviderHealth, SharedProvider, create_provider,
};
pub use timeout::{with_timeout, with_timeout_map};
