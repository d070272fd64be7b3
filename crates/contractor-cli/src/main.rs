//! Contractor CLI - co-author prompt contracts from the terminal
//!
//! Drives the same [`ChatService`] a graphical front end would use.

mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use contractor_core::config::{Config, ConfigManager};
use contractor_core::orchestration::{create_standard_tool_registry, OrchestrationEngine, ToolResult};
use contractor_core::provider::{create_provider, GenAIProvider, ModelProvider, ProviderType};
use contractor_core::session::{ChatService, ContractDraft, Role};
use contractor_core::tools::ProposeContract;
use contractor_core::{BackendConnectionManager, TurnOutcome};

use repl::{ReplCommand, HELP};

#[derive(Parser)]
#[command(name = "contractor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Co-author structured prompt contracts with an AI architect", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// LLM Provider (openai, anthropic, gemini, etc.) - defaults to config setting
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use (defaults to the configured or provider default model)
    #[arg(short, long)]
    model: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat mode
    Chat,

    /// Show the tool catalog and backend status
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    let mut config = config_manager.config().clone();

    // warn by default so logs stay out of the prompt; RUST_LOG wins over both
    let default_filter = if cli.verbose {
        "info,contractor_core=debug".to_string()
    } else {
        config.general.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    apply_overrides(&mut config, cli.provider.as_deref(), cli.model.as_deref())?;

    match cli.command {
        Some(Commands::Tools) => show_tools(&config).await,
        Some(Commands::Chat) | None => run_chat(&config).await?,
    }

    Ok(())
}

/// Fold `--provider` and `--model` into the loaded provider config
fn apply_overrides(config: &mut Config, provider: Option<&str>, model: Option<&str>) -> anyhow::Result<()> {
    if let Some(provider) = provider {
        let requested: ProviderType = provider.parse().map_err(anyhow::Error::msg)?;
        let configured = config.provider.provider_type.parse::<ProviderType>().ok();
        if configured != Some(requested) {
            // Model and key settings belong to the configured provider
            config.provider.provider_type = requested.as_str().to_string();
            config.provider.model = String::new();
            config.provider.api_key = None;
            config.provider.api_key_env = None;
        }
    }
    if let Some(model) = model {
        config.provider.model = model.to_string();
    }
    Ok(())
}

async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let provider = match create_provider(&config.provider) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            eprintln!("{}", style(e.to_string()).red());
            return Ok(());
        }
    };

    let backends = Arc::new(BackendConnectionManager::new(config.enabled_backends()));
    let registry = Arc::new(create_standard_tool_registry(backends.clone()));
    let engine = OrchestrationEngine::new(provider.clone() as Arc<dyn ModelProvider>, registry)
        .with_settings(config.orchestration.clone());
    let service = ChatService::new(Arc::new(engine));

    println!(
        "{} {} {}",
        style("Contractor").bold().cyan(),
        style(format!("({} / {})", provider.name(), provider.model())).dim(),
        style("- type /help for commands").dim()
    );

    let result = chat_loop(&service, &provider).await;
    backends.dispose().await;
    result
}

async fn chat_loop(service: &ChatService, provider: &GenAIProvider) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;

    loop {
        let prompt = format!("{}> ", service.active_session());
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Message(text) => {
                println!("{}", style("Thinking...").dim());
                match service.send_message(&text).await {
                    Ok(outcome) => {
                        print_outcome(&outcome);
                        if proposed_draft(&outcome) {
                            println!("{}", style("A contract draft is ready - /draft to review, /apply to accept").yellow());
                        }
                    }
                    Err(e) if e.is_retryable() => {
                        println!("{}", style(format!("Error: {} (nothing was saved, try again)", e)).red());
                    }
                    Err(e) => println!("{}", style(format!("Error: {}", e)).red()),
                }
            }
            ReplCommand::Draft => match service.get_messages().await.latest_draft {
                Some(draft) => print_draft(&draft),
                None => println!("{}", style("No pending draft").dim()),
            },
            ReplCommand::Apply => match service.clear_draft().await {
                Some(draft) => {
                    print_draft(&draft);
                    println!("{}", style("Draft applied").green());
                }
                None => println!("{}", style("No pending draft").dim()),
            },
            ReplCommand::Session(Some(id)) => match service.switch_session(id.as_str()) {
                Ok(()) => println!("{}", style(format!("Switched to session '{}'", id)).green()),
                Err(e) => println!("{}", style(format!("Error: {}", e)).red()),
            },
            ReplCommand::Session(None) => {
                let active = service.active_session();
                for id in service.session_ids() {
                    let marker = if id == active { "*" } else { " " };
                    println!("  {} {}", marker, style(id).cyan());
                }
            }
            ReplCommand::History => {
                let snapshot = service.get_messages().await;
                if snapshot.messages.is_empty() {
                    println!("{}", style("No messages yet").dim());
                }
                for message in &snapshot.messages {
                    let speaker = match message.role {
                        Role::User => style("You").bold().blue(),
                        Role::Assistant => style("Assistant").bold().green(),
                        Role::System | Role::Tool => style("System").bold().dim(),
                    };
                    println!("{}: {}", speaker, message.text());
                }
            }
            ReplCommand::Model(Some(model)) => {
                provider.set_model(model.as_str());
                println!("{}", style(format!("Model set to {}", model)).green());
            }
            ReplCommand::Model(None) => println!("Model: {}", style(provider.model()).cyan()),
            ReplCommand::Unknown(name) => {
                println!("{}", style(format!("Unknown command: /{}. Use /help to see available commands.", name)).red());
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    for call in outcome.tool_calls.iter().flatten() {
        match &call.result {
            ToolResult::Success(_) => {
                println!("  {} {}", style("✓").green(), style(format!("{} completed", call.name)).dim());
            }
            ToolResult::Error(message) => {
                println!("  {} {}", style("✗").red(), style(format!("{} failed: {}", call.name, message)).dim());
            }
        }
    }
    println!("{}: {}", style("Assistant").bold().green(), outcome.content);
}

/// Whether this turn staged a new contract draft
fn proposed_draft(outcome: &TurnOutcome) -> bool {
    outcome
        .tool_calls
        .iter()
        .flatten()
        .any(|call| call.name == ProposeContract::NAME && !call.result.is_error())
}

fn print_draft(draft: &ContractDraft) {
    println!("{}", style("Contract Draft:").bold());
    let fields = [
        ("Goal", &draft.goal),
        ("Constraints", &draft.constraints),
        ("Format", &draft.format),
        ("Failure conditions", &draft.failure_conditions),
    ];
    for (label, value) in fields {
        println!("  {}", style(label).cyan());
        for line in value.lines() {
            println!("    {}", line);
        }
    }
}

async fn show_tools(config: &Config) {
    let backends = Arc::new(BackendConnectionManager::new(config.enabled_backends()));
    let registry = create_standard_tool_registry(backends.clone());

    println!("{}", style("Available Tools:").bold());
    println!();
    for tool in registry.catalog().await {
        let source = match backends.route_for(&tool.name) {
            Some(backend) if registry.get(&tool.name).is_none() => style(backend).yellow(),
            _ => style("built-in".to_string()).green(),
        };
        let description = tool.description.lines().next().unwrap_or_default();
        println!("  {:<24} {:<50} [{}]", style(&tool.name).cyan(), description, source);
    }

    println!();
    println!("{}", style("Backends:").bold());
    let statuses = backends.list_backends();
    if statuses.is_empty() {
        println!("  {}", style("No backends connected").dim());
    }
    for status in statuses {
        let state = if status.connected {
            style("connected").green()
        } else {
            style("disconnected").red()
        };
        println!(
            "  {:<16} {:<40} {} tools [{}]",
            style(&status.name).cyan(),
            status.endpoint,
            status.tool_count,
            state
        );
    }

    backends.dispose().await;
}
