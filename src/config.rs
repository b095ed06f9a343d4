//! Configuration types.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::conversation::DEFAULT_CONTEXT_LIMIT;
use crate::error::ConfigError;

/// Instruction sent ahead of every transcript.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Fin, a friendly personal finance assistant. \
Help people with budgeting, saving, credit, banking and investing basics. \
Keep answers short and practical, explain jargon in plain words, and suggest \
speaking with a licensed professional before any major financial decision. \
When it helps, close with 2-3 relevant follow-up questions the user could ask next.";

/// Greeting shown before the first user turn. `{model}` is replaced with
/// the model answering the conversation.
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi! I'm Fin, your financial assistant, running on {model}. \
I can help with budgeting, saving, credit and investing questions. What would you like to work on?";

/// Upper bound on a single provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the assistant event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Prior messages sent with each turn.
    pub context_limit: usize,
    /// Provider calls taking longer than this fail as network errors.
    pub request_timeout: Duration,
    pub system_prompt: String,
    /// Seeded into an empty conversation. `None` starts with an empty log.
    pub welcome_message: Option<String>,
    pub event_capacity: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            context_limit: DEFAULT_CONTEXT_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            welcome_message: Some(DEFAULT_WELCOME_MESSAGE.to_string()),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AssistantConfig {
    /// Build from `FIN_ASSIST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(limit) = parse_var(&lookup, "FIN_ASSIST_CONTEXT_LIMIT")? {
            config.context_limit = limit;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "FIN_ASSIST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ConfigError::invalid(
                    "FIN_ASSIST_TIMEOUT_SECS",
                    "must be greater than zero",
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(prompt) = parse_var::<String>(&lookup, "FIN_ASSIST_SYSTEM_PROMPT")? {
            config.system_prompt = prompt;
        }

        Ok(config)
    }

    pub fn without_welcome(mut self) -> Self {
        self.welcome_message = None;
        self
    }
}

/// Read and parse one variable. Unset or blank values read as `None`.
pub(crate) fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e| ConfigError::invalid(key, format!("'{raw}': {e}")))
}
