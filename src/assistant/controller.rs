//! Conversation controller: runs one turn at a time against a provider.

use std::sync::{Arc, Mutex, PoisonError, RwLock as StdRwLock};

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, warn};

use crate::config::AssistantConfig;
use crate::conversation::{ConversationLog, Message, window};
use crate::error::{Error, ProviderError, Result, TurnError};
use crate::llm::{ProviderClient, ProviderConfig, create_provider};
use crate::suggestions::{FALLBACK_MESSAGE, RECOVERY_SUGGESTIONS, WELCOME_SUGGESTIONS, suggest};

use super::events::AssistantEvent;
use super::state::TurnState;

/// Owns one conversation and the backend it talks to.
///
/// At most one turn is in flight: a second [`submit`](Self::submit) while
/// a reply is pending is rejected with [`TurnError::Busy`]. Provider
/// failures never surface as errors; they become a fallback reply plus an
/// [`AssistantEvent::TurnFailed`].
pub struct ConversationController {
    log: RwLock<ConversationLog>,
    state: Mutex<TurnState>,
    provider: StdRwLock<Arc<dyn ProviderClient>>,
    config: AssistantConfig,
    tx: broadcast::Sender<AssistantEvent>,
}

impl ConversationController {
    /// Start a session, seeding the welcome message if one is configured.
    pub fn new(provider: Arc<dyn ProviderClient>, config: AssistantConfig) -> Self {
        Self::from_log(provider, config, ConversationLog::new())
    }

    /// Resume a session from saved messages. The welcome message is only
    /// added when the history is empty.
    pub fn with_history(
        provider: Arc<dyn ProviderClient>,
        config: AssistantConfig,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<Self> {
        let log = ConversationLog::from_messages(messages)?;
        Ok(Self::from_log(provider, config, log))
    }

    fn from_log(
        provider: Arc<dyn ProviderClient>,
        config: AssistantConfig,
        mut log: ConversationLog,
    ) -> Self {
        if log.is_empty() {
            if let Some(ref welcome) = config.welcome_message {
                let greeting = welcome.replace("{model}", provider.model_name());
                let message = Message::assistant(greeting)
                    .with_suggestions(WELCOME_SUGGESTIONS)
                    .stamped_at(log.next_timestamp());
                if let Err(e) = log.append(message) {
                    error!(error = %e, "Failed to seed welcome message");
                }
            }
        }

        info!(
            provider = provider.name(),
            model = provider.model_name(),
            messages = log.len(),
            context_limit = config.context_limit,
            "Conversation started"
        );

        let (tx, _rx) = broadcast::channel(config.event_capacity.max(1));
        Self {
            log: RwLock::new(log),
            state: Mutex::new(TurnState::Idle),
            provider: StdRwLock::new(provider),
            config,
            tx,
        }
    }

    /// Subscribe to conversation events.
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> TurnState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the conversation in order.
    pub async fn messages(&self) -> Vec<Message> {
        self.log.read().await.messages().to_vec()
    }

    /// Suggestions attached to the most recent message, empty if it has none.
    pub async fn last_suggestions(&self) -> Vec<String> {
        self.log
            .read()
            .await
            .last()
            .map(|m| m.suggestions().to_vec())
            .unwrap_or_default()
    }

    /// The provider new turns will use.
    pub fn provider(&self) -> Arc<dyn ProviderClient> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a different backend. A turn already in flight keeps the
    /// provider it started with.
    pub fn set_provider(&self, provider: Arc<dyn ProviderClient>) {
        info!(
            provider = provider.name(),
            model = provider.model_name(),
            "Provider replaced"
        );
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = provider;
    }

    /// Validate `config`, build its client and make it current.
    pub fn configure(&self, config: ProviderConfig) -> Result<()> {
        let provider = create_provider(&config, &self.config.system_prompt)?;
        self.set_provider(provider);
        Ok(())
    }

    /// Run one turn and return the assistant message it produced.
    ///
    /// The context window covers messages before this submission; the new
    /// text goes to the backend as the final user turn.
    pub async fn submit(&self, text: &str) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput.into());
        }

        let turn = self.begin_turn()?;
        let provider = self.provider();

        let context = {
            let mut log = self.log.write().await;
            let context = window(&log, self.config.context_limit);
            let user = Message::user(text).stamped_at(log.next_timestamp());
            self.append_locked(&mut log, user)?;
            context
        };

        debug!(
            provider = provider.name(),
            context = context.len(),
            "Dispatching turn"
        );

        let result = match tokio::time::timeout(
            self.config.request_timeout,
            provider.generate_response(text, &context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::network(
                provider.name(),
                format!(
                    "no response within {}s",
                    self.config.request_timeout.as_secs_f32()
                ),
            )),
        };

        let reply = match result {
            Ok(reply) => Message::assistant(reply.content).with_suggestions(suggest(text)),
            Err(e) => {
                warn!(
                    kind = %e.kind,
                    provider = %e.provider,
                    status = ?e.status,
                    retry_after = ?e.retry_after,
                    transient = e.is_transient(),
                    "Turn failed: {}",
                    e.detail
                );
                self.emit(AssistantEvent::TurnFailed {
                    kind: e.kind,
                    detail: e.detail,
                });
                Message::assistant(FALLBACK_MESSAGE).with_suggestions(RECOVERY_SUGGESTIONS)
            }
        };

        let reply = {
            let mut log = self.log.write().await;
            let reply = reply.stamped_at(log.next_timestamp());
            self.append_locked(&mut log, reply.clone())?;
            reply
        };

        turn.finish();
        Ok(reply)
    }

    fn append_locked(&self, log: &mut ConversationLog, message: Message) -> Result<()> {
        if let Err(e) = log.append(message.clone()) {
            error!(error = %e, "Conversation log rejected message");
            return Err(Error::Conversation(e));
        }
        self.emit(AssistantEvent::MessageAppended { message });
        Ok(())
    }

    /// Idle -> AwaitingResponse, or `Busy`. The lock is released before
    /// returning so it is never held across an await.
    fn begin_turn(&self) -> std::result::Result<TurnGuard<'_>, TurnError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.can_transition_to(TurnState::AwaitingResponse) {
                return Err(TurnError::Busy);
            }
            *state = TurnState::AwaitingResponse;
        }
        self.emit(AssistantEvent::StateChanged {
            from: TurnState::Idle,
            to: TurnState::AwaitingResponse,
        });
        Ok(TurnGuard { controller: self })
    }

    fn end_turn(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.is_busy() {
                return;
            }
            *state = TurnState::Idle;
        }
        self.emit(AssistantEvent::StateChanged {
            from: TurnState::AwaitingResponse,
            to: TurnState::Idle,
        });
    }

    fn emit(&self, event: AssistantEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

/// Returns the controller to `Idle` however the turn ends, including when
/// the `submit` future is dropped mid-call.
struct TurnGuard<'a> {
    controller: &'a ConversationController,
}

impl TurnGuard<'_> {
    fn finish(self) {}
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.controller.end_turn();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::conversation::Role;
    use crate::error::ProviderErrorKind;
    use crate::llm::{ChatMessage, Reply};

    struct EchoProvider;

    #[async_trait]
    impl ProviderClient for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn model_name(&self) -> &str {
            "echo-1"
        }

        async fn generate_response(
            &self,
            user_text: &str,
            _context: &[ChatMessage],
        ) -> std::result::Result<Reply, ProviderError> {
            Ok(Reply::new(format!("echo: {user_text}")))
        }
    }

    struct FailingProvider(ProviderErrorKind);

    #[async_trait]
    impl ProviderClient for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn model_name(&self) -> &str {
            "none"
        }

        async fn generate_response(
            &self,
            _user_text: &str,
            _context: &[ChatMessage],
        ) -> std::result::Result<Reply, ProviderError> {
            Err(ProviderError::new(self.0, "failing", "simulated"))
        }
    }

    /// Blocks until released so a turn can be held open.
    #[derive(Default)]
    struct GatedProvider {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ProviderClient for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        fn model_name(&self) -> &str {
            "gated-1"
        }

        async fn generate_response(
            &self,
            _user_text: &str,
            _context: &[ChatMessage],
        ) -> std::result::Result<Reply, ProviderError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Reply::new("done"))
        }
    }

    fn bare_config() -> AssistantConfig {
        AssistantConfig::default().without_welcome()
    }

    #[tokio::test]
    async fn welcome_message_is_seeded() {
        let controller = ConversationController::new(Arc::new(EchoProvider), AssistantConfig::default());
        let messages = controller.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::Assistant);
        assert!(messages[0].content().contains("echo-1"));
        assert!(!messages[0].content().contains("{model}"));
        assert_eq!(messages[0].suggestions(), WELCOME_SUGGESTIONS);
        assert_eq!(controller.last_suggestions().await, WELCOME_SUGGESTIONS);
    }

    #[tokio::test]
    async fn custom_welcome_names_the_model() {
        let config = AssistantConfig {
            welcome_message: Some("Powered by {model}.".into()),
            ..AssistantConfig::default()
        };
        let controller = ConversationController::new(Arc::new(GatedProvider::default()), config);
        assert_eq!(controller.messages().await[0].content(), "Powered by gated-1.");
    }

    #[tokio::test]
    async fn successful_turn() {
        let controller = ConversationController::new(Arc::new(EchoProvider), bare_config());
        let reply = controller.submit("How do I build a budget?").await.unwrap();

        assert_eq!(reply.content(), "echo: How do I build a budget?");
        assert_eq!(reply.suggestions(), suggest("budget"));
        assert_eq!(controller.state(), TurnState::Idle);

        let messages = controller.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), Role::User);
        assert_eq!(messages[1].id(), reply.id());
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_state_change() {
        let controller = ConversationController::new(Arc::new(EchoProvider), bare_config());
        let mut rx = controller.subscribe();

        let err = controller.submit("   \n").await.unwrap_err();
        assert!(matches!(err, Error::Turn(TurnError::EmptyInput)));
        assert!(controller.messages().await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn each_failure_kind_becomes_fallback() {
        for kind in [
            ProviderErrorKind::Auth,
            ProviderErrorKind::RateLimit,
            ProviderErrorKind::Network,
            ProviderErrorKind::MalformedResponse,
        ] {
            let controller = ConversationController::new(Arc::new(FailingProvider(kind)), bare_config());
            let mut rx = controller.subscribe();

            let reply = controller.submit("hello").await.unwrap();
            assert_eq!(reply.content(), FALLBACK_MESSAGE);
            assert_eq!(reply.suggestions(), RECOVERY_SUGGESTIONS);
            assert_eq!(controller.state(), TurnState::Idle);

            let mut failed = None;
            while let Ok(event) = rx.try_recv() {
                if let AssistantEvent::TurnFailed { kind, .. } = event {
                    failed = Some(kind);
                }
            }
            assert_eq!(failed, Some(kind));
        }
    }

    #[tokio::test]
    async fn busy_while_awaiting() {
        let provider = Arc::new(GatedProvider::default());
        let controller = Arc::new(ConversationController::new(provider.clone(), bare_config()));

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit("first").await })
        };
        provider.started.notified().await;

        assert_eq!(controller.state(), TurnState::AwaitingResponse);
        let before = controller.messages().await.len();
        let err = controller.submit("second").await.unwrap_err();
        assert!(matches!(err, Error::Turn(TurnError::Busy)));
        assert_eq!(controller.messages().await.len(), before);

        provider.release.notify_one();
        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply.content(), "done");
        assert_eq!(controller.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn state_events_bracket_a_turn() {
        let controller = ConversationController::new(Arc::new(EchoProvider), bare_config());
        let mut rx = controller.subscribe();
        controller.submit("hi").await.unwrap();

        let mut transitions = Vec::new();
        let mut appended = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                AssistantEvent::StateChanged { from, to } => transitions.push((from, to)),
                AssistantEvent::MessageAppended { .. } => appended += 1,
                AssistantEvent::TurnFailed { .. } => panic!("unexpected failure"),
            }
        }
        assert_eq!(
            transitions,
            [
                (TurnState::Idle, TurnState::AwaitingResponse),
                (TurnState::AwaitingResponse, TurnState::Idle),
            ]
        );
        assert_eq!(appended, 2);
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_network_failure() {
        let config = AssistantConfig {
            request_timeout: Duration::from_millis(20),
            ..bare_config()
        };
        let controller = ConversationController::new(Arc::new(GatedProvider::default()), config);
        let mut rx = controller.subscribe();

        let reply = controller.submit("hello").await.unwrap();
        assert_eq!(reply.content(), FALLBACK_MESSAGE);
        assert_eq!(controller.state(), TurnState::Idle);

        let mut failed = None;
        while let Ok(event) = rx.try_recv() {
            if let AssistantEvent::TurnFailed { kind, .. } = event {
                failed = Some(kind);
            }
        }
        assert_eq!(failed, Some(ProviderErrorKind::Network));
    }

    #[tokio::test]
    async fn set_provider_applies_to_next_turn() {
        let controller = ConversationController::new(
            Arc::new(FailingProvider(ProviderErrorKind::Auth)),
            bare_config(),
        );
        assert_eq!(controller.submit("hi").await.unwrap().content(), FALLBACK_MESSAGE);

        controller.set_provider(Arc::new(EchoProvider));
        assert_eq!(controller.provider().name(), "echo");
        assert_eq!(controller.submit("hi").await.unwrap().content(), "echo: hi");
    }

    #[tokio::test]
    async fn configure_rejects_invalid_config() {
        let controller = ConversationController::new(Arc::new(EchoProvider), bare_config());
        let config = ProviderConfig::new(crate::llm::LlmBackend::OpenAi, "sk-test".into())
            .with_temperature(3.0);
        assert!(matches!(controller.configure(config), Err(Error::Config(_))));
        assert_eq!(controller.provider().name(), "echo");
    }

    #[tokio::test]
    async fn resumed_history_skips_welcome() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let controller = ConversationController::with_history(
            Arc::new(EchoProvider),
            AssistantConfig::default(),
            history,
        )
        .unwrap();
        assert_eq!(controller.messages().await.len(), 2);

        let dup = Message::user("again");
        let err = ConversationController::with_history(
            Arc::new(EchoProvider),
            AssistantConfig::default(),
            vec![dup.clone(), dup],
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::Conversation(_)));
    }
}
