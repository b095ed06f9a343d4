//! Provider abstraction shared by every chat-completion backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;

use crate::conversation::{Message, Role};
use crate::error::ProviderError;

/// One role/content pair as sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role(), message.content())
    }
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
}

impl Reply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
///
/// Implementations make exactly one request per call and keep no
/// per-conversation state; the caller owns history and retries.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model_name(&self) -> &str;

    /// Send the system instruction, `context` and `user_text` as one request.
    async fn generate_response(
        &self,
        user_text: &str,
        context: &[ChatMessage],
    ) -> Result<Reply, ProviderError>;
}

/// Assemble the request transcript: system instruction, prior turns, new user turn.
pub fn build_messages(
    system_prompt: &str,
    context: &[ChatMessage],
    user_text: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend_from_slice(context);
    messages.push(ChatMessage::user(user_text));
    messages
}

/// Map a reqwest transport failure (no usable response) to a provider error.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> ProviderError {
    let detail = if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("could not connect: {err}")
    } else {
        err.to_string()
    };
    ProviderError::network(provider, detail)
}

/// Read the body of a response, turning non-success statuses into
/// classified provider errors.
pub(crate) async fn read_success_body(
    provider: &str,
    response: reqwest::Response,
) -> Result<String, ProviderError> {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !status.is_success() {
        return Err(
            ProviderError::from_status(provider, status.as_u16(), &body)
                .with_retry_after(retry_after),
        );
    }
    Ok(body)
}

/// Turn the extracted reply field into a [`Reply`]. A missing or blank
/// field means the backend answered without a reply.
pub(crate) fn reply_from(
    provider: &str,
    content: Option<String>,
    field: &str,
) -> Result<Reply, ProviderError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(Reply::new(text)),
        Some(_) => Err(ProviderError::malformed(
            provider,
            format!("{field} is empty"),
        )),
        None => Err(ProviderError::malformed(
            provider,
            format!("response has no {field}"),
        )),
    }
}

/// `Retry-After` in delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
