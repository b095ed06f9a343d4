//! CLI channel — stdin/stdout REPL around a conversation.

use std::fmt::Write as _;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::assistant::{AssistantEvent, ConversationController, TurnState};
use crate::channels::submission::{Submission, SubmissionParser};
use crate::conversation::{Message, Role};
use crate::error::{ChannelError, Error, ProviderErrorKind, Result, SecretError};
use crate::llm::ProviderConfig;
use crate::secrets::SecretStore;
use crate::suggestions::QUICK_ACTIONS;

const HELP: &str = "\
Ask any money question, or use a command:
  /quick [n]     list quick actions, or send action n
  /pick <n>      send suggestion n from the latest reply (earlier
                 replies' suggestions can be typed in full)
  /key <secret>  replace the API key
  /history       show the conversation
  /help          show this help
  /quit          exit";

/// What the REPL should do after handling a submission.
#[derive(Debug)]
pub enum Outcome {
    /// The assistant answered (or fell back).
    Reply(Message),
    /// Informational text for the user.
    Output(String),
    Quit,
}

/// Line-oriented REPL: replies go to stdout, status and toasts to stderr.
pub struct CliChannel {
    controller: Arc<ConversationController>,
    secrets: Arc<dyn SecretStore>,
    /// Backend settings reused when the key changes.
    provider_config: ProviderConfig,
}

impl CliChannel {
    pub fn new(
        controller: Arc<ConversationController>,
        secrets: Arc<dyn SecretStore>,
        provider_config: ProviderConfig,
    ) -> Self {
        Self {
            controller,
            secrets,
            provider_config,
        }
    }

    pub fn name(&self) -> &str {
        "cli"
    }

    /// Run against stdin until `/quit` or EOF.
    pub async fn run(&self) -> Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin())).await
    }

    pub async fn run_with<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let status = self.spawn_status_task();

        if let Some(greeting) = self.controller.messages().await.last() {
            println!("\n{}\n", render_message(greeting));
        }
        println!("{}\n", render_quick_actions());

        let result = self.read_loop(input).await;
        status.abort();
        result
    }

    async fn read_loop<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            eprint!("> ");
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break, // EOF
                Err(e) => {
                    return Err(ChannelError::ReadFailed {
                        name: self.name().to_string(),
                        reason: e.to_string(),
                    }
                    .into());
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match self.handle(SubmissionParser::parse(&line)).await {
                Ok(Outcome::Reply(message)) => println!("\n{}\n", render_message(&message)),
                Ok(Outcome::Output(text)) => println!("{text}"),
                Ok(Outcome::Quit) => break,
                Err(e @ Error::Conversation(_)) => return Err(e),
                Err(e) => eprintln!("❌ {e}"),
            }
        }
        Ok(())
    }

    /// Apply one submission.
    pub async fn handle(&self, submission: Submission) -> Result<Outcome> {
        match submission {
            Submission::UserInput { content } => self.ask(&content).await,
            Submission::QuickAction { index: None } => Ok(Outcome::Output(render_quick_actions())),
            Submission::QuickAction { index: Some(index) } => {
                let action = QUICK_ACTIONS.get(index).ok_or_else(|| {
                    ChannelError::InvalidCommand(format!(
                        "there are only {} quick actions",
                        QUICK_ACTIONS.len()
                    ))
                })?;
                println!("🧑 {}", action.prompt);
                self.ask(action.prompt).await
            }
            Submission::PickSuggestion { index } => {
                let suggestions = self.controller.last_suggestions().await;
                let Some(text) = suggestions.get(index) else {
                    return Err(ChannelError::InvalidCommand(format!(
                        "no suggestion {} on the latest reply",
                        index + 1
                    ))
                    .into());
                };
                println!("🧑 {text}");
                self.ask(text).await
            }
            Submission::SetKey { secret } => {
                self.secrets.set(secret)?;
                let secret = self.secrets.get().ok_or_else(|| {
                    SecretError::Unavailable("key was not retained".into())
                })?;
                self.controller
                    .configure(self.provider_config.clone().with_secret(secret))?;
                Ok(Outcome::Output("API key updated.".into()))
            }
            Submission::History => {
                let messages = self.controller.messages().await;
                Ok(Outcome::Output(render_history(&messages)))
            }
            Submission::Help => Ok(Outcome::Output(HELP.to_string())),
            Submission::Quit => Ok(Outcome::Quit),
            Submission::Invalid { reason } => Err(ChannelError::InvalidCommand(reason).into()),
        }
    }

    async fn ask(&self, text: &str) -> Result<Outcome> {
        let reply = self.controller.submit(text).await?;
        Ok(Outcome::Reply(reply))
    }

    /// Thinking indicator and failure toasts, driven by controller events.
    fn spawn_status_task(&self) -> JoinHandle<()> {
        let mut events = BroadcastStream::new(self.controller.subscribe());
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(AssistantEvent::StateChanged {
                        to: TurnState::AwaitingResponse,
                        ..
                    }) => eprintln!("⏳ Thinking..."),
                    Ok(AssistantEvent::TurnFailed { kind, detail }) => {
                        tracing::debug!(%kind, %detail, "Showing failure toast");
                        eprintln!("⚠️  {}", toast(kind));
                    }
                    Ok(_) => {}
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Status task lagged behind events");
                    }
                }
            }
        })
    }
}

fn toast(kind: ProviderErrorKind) -> &'static str {
    match kind {
        ProviderErrorKind::Auth => "The API key was rejected. Enter a new one with /key <secret>.",
        ProviderErrorKind::RateLimit => "The AI service is busy. Wait a moment and try again.",
        ProviderErrorKind::Network => "Could not reach the AI service. Check your connection.",
        ProviderErrorKind::MalformedResponse => "The AI service sent an unexpected response.",
    }
}

fn render_message(message: &Message) -> String {
    let speaker = match message.role() {
        Role::User => "🧑",
        Role::Assistant | Role::System => "💬",
    };
    let mut out = format!("{speaker} {}", message.content());
    if message.has_suggestions() {
        out.push('\n');
        for (i, suggestion) in message.suggestions().iter().enumerate() {
            let _ = write!(out, "\n   {}. {}", i + 1, suggestion);
        }
        out.push_str("\n   (/pick <n> to ask)");
    }
    out
}

fn render_quick_actions() -> String {
    let mut out = String::from("Quick help:");
    for (i, action) in QUICK_ACTIONS.iter().enumerate() {
        let _ = write!(out, "\n  /quick {}  {}", i + 1, action.label);
    }
    out
}

fn render_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "No messages yet.".into();
    }
    messages
        .iter()
        .map(|m| {
            format!(
                "[{}] {} {}",
                m.created_at().format("%H:%M:%S"),
                m.role(),
                m.content()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
