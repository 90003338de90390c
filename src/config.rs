//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

/// Number of trailing log messages assembled into each request.
pub const HISTORY_WINDOW: usize = 15;

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the generation capability (chat-completions wire).
    pub api_base: String,
    /// API key for the generation capability.
    pub api_key: SecretString,
    /// Model name used for the base tier.
    pub base_model: String,
    /// Model name used for the advanced tier.
    pub advanced_model: String,
    /// System instructions prepended to every request.
    pub system_prompt: String,
    /// Request timeout for one generation round trip.
    pub request_timeout: Duration,
    /// Maximum tool round trips per assistant turn.
    pub max_tool_rounds: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: SecretString::from(""),
            base_model: "gpt-4o-mini".to_string(),
            advanced_model: "gpt-4o".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: Duration::from_secs(60),
            max_tool_rounds: 4,
        }
    }
}

/// Default system instructions for the assistant.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are AfuAi, the in-app assistant for the Afu chat and marketplace app. \
Answer concisely and helpfully. You can look up users by name, search the \
product catalog, and read web pages through your tools. Use a tool whenever \
the question concerns a user, a product, or a URL.";
