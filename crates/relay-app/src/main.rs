//! Relay application binary - composition root.
//!
//! 1. Parse CLI flags and read configuration from TOML
//! 2. Initialize tracing, then fail on an invalid configuration
//! 3. Build the shared history and persona stores
//! 4. Build the completion client and the dialog orchestrator
//! 5. Run the console transport until `/quit` or end of input

mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use relay_chat::{
    DialogOrchestrator, DirPromptSource, HistoryStore, InboundMessage, PersonaLibrary,
    StyleSelector,
};
use relay_core::{ConversationId, RelayConfig};
use relay_llm::{GenerationParams, OpenAiCompatibleClient};

use crate::cli::CliArgs;
use crate::console::{parse_line, ConsoleCommand, ConsoleSink};

/// The console is a single conversation with a single user.
const CONSOLE_CONVERSATION: ConversationId = ConversationId(1);
const CONSOLE_USER_ID: i64 = 1;

fn console_user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Гость".to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts, so failures are held until the
    // subscriber exists and then reported.
    let config_file = args.resolve_config_path();
    let loaded = RelayConfig::load_if_exists(&config_file);

    // Tracing. RUST_LOG wins, then --log-level, then the config file.
    let log_level = args.startup_log_level(loaded.as_ref().ok().and_then(Option::as_ref));
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Relay v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(Some(config)) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Ok(None) => {
            tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
            RelayConfig::default()
        }
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    args.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration after overrides");
        return Err(e.into());
    }

    // Persona prompts. A missing default prompt is fatal.
    let personas = Arc::new(PersonaLibrary::new(DirPromptSource::new(
        &config.general.prompts_dir,
    )));
    if let Err(e) = personas.ensure_default() {
        tracing::error!(error = %e, "Default persona prompt unavailable");
        return Err(e.into());
    }

    // Completion backend.
    let client = OpenAiCompatibleClient::from_config(&config.llm)?;
    if config.llm.api_key.is_none() {
        tracing::warn!("No API key configured; every reply will fall back to the apology text");
    }
    tracing::info!(endpoint = client.endpoint(), model = %config.llm.model, "Completion client ready");

    // Shared stores and orchestrator.
    let history = Arc::new(HistoryStore::new());
    let styles = Arc::new(StyleSelector::new());
    let orchestrator = Arc::new(
        DialogOrchestrator::new(
            history,
            styles,
            personas,
            Arc::new(client),
            Arc::new(ConsoleSink),
        )
        .with_dialog_config(&config.dialog)
        .with_params(GenerationParams::from(&config.llm)),
    );

    run_console(orchestrator).await?;
    tracing::info!("Relay stopped");
    Ok(())
}

/// Read stdin line by line; every message is handled in its own task.
async fn run_console(orchestrator: Arc<DialogOrchestrator>) -> std::io::Result<()> {
    let user_name = console_user_name();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    println!("Relay готов. Команды: /start, /style <persona>, /styles, /quit");

    while let Some(line) = lines.next_line().await? {
        let inbound = match parse_line(&line) {
            ConsoleCommand::Empty => continue,
            ConsoleCommand::Quit => break,
            ConsoleCommand::ListStyles => {
                for (tag, description) in orchestrator.available_styles() {
                    println!("  {:<10} {}", tag, description);
                }
                continue;
            }
            ConsoleCommand::SelectStyle(tag) => {
                match orchestrator.select_persona(CONSOLE_CONVERSATION, tag) {
                    Some(style) => println!("Стиль: {}", style.label()),
                    None => println!("Неизвестный стиль '{}'. Список: /styles", tag),
                }
                continue;
            }
            ConsoleCommand::Start => {
                InboundMessage::start(CONSOLE_CONVERSATION, CONSOLE_USER_ID, user_name.clone())
            }
            ConsoleCommand::Message(text) => InboundMessage::text(
                CONSOLE_CONVERSATION,
                CONSOLE_USER_ID,
                user_name.clone(),
                text,
            ),
        };

        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move {
            if let Err(e) = orchestrator.handle(&inbound).await {
                tracing::warn!(error = %e, "Message not handled");
                println!("{}", e);
            }
        });

        // Reap finished handlers so the set does not grow unbounded.
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                tracing::error!(error = %e, "Message handler panicked");
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Message handler panicked");
        }
    }
    Ok(())
}
