//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;

use super::ProviderConfig;
use super::provider::{
    ChatMessage, ProviderClient, Reply, build_messages, read_success_body, reply_from,
    transport_error,
};

const PROVIDER: &str = "openai";
const REPLY_FIELD: &str = "choices[0].message.content";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to `POST {endpoint}` with a bearer token and a chat-completions body.
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    system_prompt: String,
}

impl OpenAiProvider {
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

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ProviderClient for OpenAiProvider {
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
            messages = messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.secret.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let text = read_success_body(PROVIDER, response).await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::malformed(PROVIDER, format!("invalid response body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);
        reply_from(PROVIDER, content, REPLY_FIELD)
    }
}
