//! Anthropic messages API client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::Role;
use crate::error::ProviderError;

use super::ProviderConfig;
use super::provider::{
    ChatMessage, ProviderClient, Reply, build_messages, read_success_body, reply_from,
    transport_error,
};

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REPLY_FIELD: &str = "content[type=text].text";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// The messages API accepts temperatures in [0, 1].
const MAX_TEMPERATURE: f32 = 1.0;

pub struct AnthropicProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    system_prompt: String,
}

impl AnthropicProvider {
    pub fn new(
        config: ProviderConfig,
        system_prompt: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                ProviderError::network(PROVIDER, format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            system_prompt: system_prompt.into(),
        })
    }

    /// System entries move to the top-level `system` field; the transcript
    /// must open with a user turn, so leading assistant entries are skipped.
    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> MessagesRequest<'a> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let turns = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .skip_while(|m| m.role != Role::User)
            .collect();

        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature.min(MAX_TEMPERATURE),
            system: (!system.is_empty()).then_some(system),
            messages: turns,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl ProviderClient for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate_response(
        &self,
        user_text: &str,
        context: &[ChatMessage],
    ) -> Result<Reply, ProviderError> {
        let messages = build_messages(&self.system_prompt, context, user_text);
        let body = self.build_request(&messages);

        debug!(
            model = %self.config.model,
            messages = body.messages.len(),
            "Sending messages request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", self.config.secret.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let text = read_success_body(PROVIDER, response).await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::malformed(PROVIDER, format!("invalid response body: {e}")))?;

        let content = parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text);
        reply_from(PROVIDER, content, REPLY_FIELD)
    }
}
