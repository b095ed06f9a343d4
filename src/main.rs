use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use fin_assist::assistant::ConversationController;
use fin_assist::channels::CliChannel;
use fin_assist::config::AssistantConfig;
use fin_assist::error::ConfigError;
use fin_assist::llm::{LlmBackend, ProviderConfig, create_provider};
use fin_assist::secrets::{EnvSecretStore, SecretStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    let backend = LlmBackend::from_env().context("reading FIN_ASSIST_BACKEND")?;
    let secrets: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new(backend.api_key_var()));

    let secret = match secrets.get() {
        Some(secret) => secret,
        None => {
            let entered = prompt_for_key(backend)?;
            secrets.set(entered).context("storing API key")?;
            secrets
                .get()
                .context("API key was not retained by the secret store")?
        }
    };

    let provider_config = ProviderConfig::from_env(backend, secret)?;
    let assistant_config = AssistantConfig::from_env()?;

    eprintln!("💰 Fin Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", backend);
    eprintln!("   Model: {}", provider_config.model);
    eprintln!("   Context window: {} messages", assistant_config.context_limit);
    eprintln!("   Type a question and press Enter. /help for commands, /quit to exit.\n");

    let provider = create_provider(&provider_config, &assistant_config.system_prompt)?;
    let controller = Arc::new(ConversationController::new(provider, assistant_config));

    let cli = CliChannel::new(controller, secrets, provider_config);
    cli.run().await?;

    eprintln!("Goodbye!");
    Ok(())
}

/// Logs go to stderr, or to a daily file under `FIN_ASSIST_LOG_DIR`.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (writer, guard) = match std::env::var("FIN_ASSIST_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "fin-assist.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        _ => (BoxMakeWriter::new(std::io::stderr), None),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .init();

    guard
}

fn prompt_for_key(backend: LlmBackend) -> anyhow::Result<SecretString> {
    eprintln!("No {} API key found ({} is not set).", backend, backend.api_key_var());
    eprint!("Enter API key: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading API key from stdin")?;
    let key = line.trim();
    if key.is_empty() {
        return Err(ConfigError::MissingEnvVar(backend.api_key_var().to_string()).into());
    }
    Ok(SecretString::from(key))
}
