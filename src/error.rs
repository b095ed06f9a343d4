//! Error types for Fin Assist.

use std::time::Duration;

use serde::Serialize;

use crate::conversation::MessageId;

/// Top-level error type for the assistant core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Turn rejected: {0}")]
    Turn(#[from] TurnError),

    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("Secret store error: {0}")]
    Secret(#[from] SecretError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// How a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Credential rejected (HTTP 401/403).
    Auth,
    /// Backend throttled the request (HTTP 429).
    RateLimit,
    /// No usable response: transport failure, timeout, or unexpected status.
    Network,
    /// Success status but the body did not carry a reply.
    MalformedResponse,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::MalformedResponse => "malformed_response",
        };
        write!(f, "{s}")
    }
}

/// A failed chat-completion call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failure from {provider}: {detail}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub provider: String,
    pub detail: String,
    /// HTTP status, when the backend answered at all.
    pub status: Option<u16>,
    /// Backend-requested delay before retrying (rate limits only).
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(
        kind: ProviderErrorKind,
        provider: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            provider: provider.into(),
            detail: detail.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn auth(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Auth, provider, detail)
    }

    pub fn rate_limited(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimit, provider, detail)
    }

    pub fn network(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, provider, detail)
    }

    pub fn malformed(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, provider, detail)
    }

    /// Classify a non-success HTTP status.
    ///
    /// 401/403 are auth failures and 429 is a rate limit. Every other
    /// status means the backend gave no usable answer, which the turn
    /// logic treats the same as an unreachable backend.
    pub fn from_status(provider: impl Into<String>, status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            429 => ProviderErrorKind::RateLimit,
            _ => ProviderErrorKind::Network,
        };
        let detail = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", truncate_detail(body.trim(), 200))
        };
        Self::new(kind, provider, detail).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Whether a later attempt could plausibly succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimit | ProviderErrorKind::Network
        )
    }
}

/// Cut a backend error body down to a loggable preview.
fn truncate_detail(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => format!("{}...", &text[..byte_offset]),
        None => text.to_string(),
    }
}

/// Submissions rejected before a turn starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("A response is still pending; wait for it before sending another message")]
    Busy,
}

/// Conversation log invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("Message {id} is already in the conversation")]
    DuplicateId { id: MessageId },
}

/// Secret store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("API key must not be empty")]
    Empty,

    #[error("Secret store unavailable: {0}")]
    Unavailable(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to read input on channel {name}: {reason}")]
    ReadFailed { name: String, reason: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// Result type alias for the assistant core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ProviderError::from_status("openai", 401, "").kind,
            ProviderErrorKind::Auth
        );
        assert_eq!(
            ProviderError::from_status("openai", 403, "forbidden").kind,
            ProviderErrorKind::Auth
        );
        assert_eq!(
            ProviderError::from_status("openai", 429, "slow down").kind,
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderError::from_status("openai", 500, "boom").kind,
            ProviderErrorKind::Network
        );
        assert_eq!(
            ProviderError::from_status("openai", 503, "").status,
            Some(503)
        );
    }

    #[test]
    fn status_detail_is_truncated() {
        let body = "x".repeat(1_000);
        let err = ProviderError::from_status("openai", 500, &body);
        assert!(err.detail.starts_with("HTTP 500: "));
        assert!(err.detail.ends_with("..."));
        assert!(err.detail.len() < 300);
    }

    #[test]
    fn transient_kinds() {
        assert!(ProviderError::network("openai", "timeout").is_transient());
        assert!(ProviderError::rate_limited("openai", "429").is_transient());
        assert!(!ProviderError::auth("openai", "bad key").is_transient());
        assert!(!ProviderError::malformed("openai", "no choices").is_transient());
    }

    #[test]
    fn display_includes_kind_and_provider() {
        let err = ProviderError::auth("anthropic", "invalid x-api-key");
        assert_eq!(
            err.to_string(),
            "auth failure from anthropic: invalid x-api-key"
        );
    }
}
