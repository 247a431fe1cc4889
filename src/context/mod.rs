// src/context/mod.rs

use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Which wire contract the completion endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// `{systemMessage, userPrompt}` in, `{text}` out.
    Webhook,
    /// OpenAI-compatible chat completions.
    ChatCompletions,
}

/// Explicit runtime configuration for the next-action pipeline.
///
/// Passed into the planner at call time instead of being read from shared
/// application state.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub provider: Provider,
    pub endpoint: String,
    pub max_attempts: u32,
    /// Deadline applied to every completion request.
    pub request_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            provider: Provider::ChatCompletions,
            endpoint: DEFAULT_CHAT_ENDPOINT.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Duration::from_secs(60),
            max_tokens: 500,
            temperature: 0.0,
        }
    }

    /// Reads `AGENT_*` environment variables on top of the defaults.
    /// Unparseable numeric values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(key) = lookup("AGENT_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.api_key = Some(key);
        }
        if let Some(model) = lookup("AGENT_MODEL") {
            config.model = model;
        }
        if let Some(endpoint) = lookup("AGENT_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(provider) = lookup("AGENT_PROVIDER") {
            config.provider = match provider.trim().to_ascii_lowercase().as_str() {
                "webhook" => Provider::Webhook,
                "chat" | "chat_completions" | "openai" => Provider::ChatCompletions,
                other => {
                    warn!(provider = other, "unknown AGENT_PROVIDER, using chat completions");
                    Provider::ChatCompletions
                }
            };
        }
        if config.provider == Provider::Webhook && config.endpoint == DEFAULT_CHAT_ENDPOINT {
            warn!("webhook provider selected without AGENT_ENDPOINT");
        }
        if let Some(attempts) = lookup("AGENT_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.max_attempts = attempts;
        }
        if let Some(secs) = lookup("AGENT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_webhook(mut self, endpoint: &str) -> Self {
        self.provider = Provider::Webhook;
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new()
    }
}
