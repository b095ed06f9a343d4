//! LLM integration for Fin Assist.
//!
//! Supports:
//! - **OpenAI**: chat completions (and any server speaking the same protocol)
//! - **Anthropic**: messages API
//!
//! Both backends are plain reqwest clients behind the [`ProviderClient`]
//! trait; [`create_provider`] picks one from [`ProviderConfig::backend`].

mod anthropic;
mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::*;

use std::str::FromStr;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::config::parse_var;
use crate::error::{ConfigError, Error};

/// Default completion cap per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 500;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Accepted temperature range.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    OpenAi,
    Anthropic,
}

impl LlmBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    /// Environment variable conventionally holding this backend's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Read `FIN_ASSIST_BACKEND`, defaulting to OpenAI.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(parse_var(&lookup, "FIN_ASSIST_BACKEND")?.unwrap_or_default())
    }
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "open-ai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(format!("unknown backend '{other}' (expected openai or anthropic)")),
        }
    }
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub backend: LlmBackend,
    pub secret: SecretString,
    /// Full request URL.
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProviderConfig {
    /// Backend defaults for everything but the secret.
    pub fn new(backend: LlmBackend, secret: SecretString) -> Self {
        Self {
            backend,
            secret,
            endpoint: backend.default_endpoint().to_string(),
            model: backend.default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_secret(mut self, secret: SecretString) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build from `FIN_ASSIST_*` environment variables.
    pub fn from_env(backend: LlmBackend, secret: SecretString) -> Result<Self, ConfigError> {
        Self::from_lookup(backend, secret, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, then validate.
    pub fn from_lookup(
        backend: LlmBackend,
        secret: SecretString,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(backend, secret);

        if let Some(endpoint) = parse_var::<String>(&lookup, "FIN_ASSIST_ENDPOINT")? {
            config.endpoint = endpoint;
        }
        if let Some(model) = parse_var::<String>(&lookup, "FIN_ASSIST_MODEL")? {
            config.model = model;
        }
        if let Some(max_tokens) = parse_var(&lookup, "FIN_ASSIST_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = parse_var(&lookup, "FIN_ASSIST_TEMPERATURE")? {
            config.temperature = temperature;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: self.backend.api_key_var().to_string(),
                hint: format!("Set {} or enter a key at startup.", self.backend.api_key_var()),
            });
        }

        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::invalid("endpoint", format!("{}: {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(ConfigError::invalid(
                "endpoint",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model", "must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid("max_tokens", "must be greater than zero"));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("{} is outside [0, 2]", self.temperature),
            ));
        }
        Ok(())
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(
    config: &ProviderConfig,
    system_prompt: &str,
) -> Result<Arc<dyn ProviderClient>, Error> {
    config.validate()?;
    match config.backend {
        LlmBackend::OpenAi => create_openai_provider(config, system_prompt),
        LlmBackend::Anthropic => create_anthropic_provider(config, system_prompt),
    }
}

fn create_openai_provider(
    config: &ProviderConfig,
    system_prompt: &str,
) -> Result<Arc<dyn ProviderClient>, Error> {
    let provider = OpenAiProvider::new(config.clone(), system_prompt)?;
    tracing::info!("Using OpenAI (model: {}, endpoint: {})", config.model, config.endpoint);
    Ok(Arc::new(provider))
}

fn create_anthropic_provider(
    config: &ProviderConfig,
    system_prompt: &str,
) -> Result<Arc<dyn ProviderClient>, Error> {
    let provider = AnthropicProvider::new(config.clone(), system_prompt)?;
    tracing::info!("Using Anthropic (model: {}, endpoint: {})", config.model, config.endpoint);
    Ok(Arc::new(provider))
}
