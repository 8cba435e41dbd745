//! LocalChat - chat with a locally hosted model
//!
//! CLI entry point for interactive chat and one-shot backend commands.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use localchat::cli::{Cli, Command, ConversationCommand};
use localchat::config::Config;
use localchat::repl::{self, ChatOptions};
use localchat::{ChatSession, ConversationId, SessionOptions, create_backend};

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("localchat")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to the log file, never the terminal the chat is using
    let level = level
        .and_then(|l| l.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    let log_file = fs::File::create(log_dir.join("localchat.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()));
    setup_logging(level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    info!(
        "LocalChat loaded config: base_url={}, timeout_ms={}",
        config.backend.base_url, config.backend.timeout_ms
    );

    match cli.command {
        None => repl::run_interactive(&config, ChatOptions::default()).await,
        Some(Command::Chat { model, attach, schema }) => {
            repl::run_interactive(&config, ChatOptions { model, attach, schema }).await
        }
        Some(Command::Ask {
            message,
            attach,
            schema,
        }) => cmd_ask(&config, &message, &attach, schema.as_deref()).await,
        Some(Command::Models) => cmd_models(&config).await,
        Some(Command::Status) => cmd_status(&config).await,
        Some(Command::Load { name }) => cmd_load(&config, &name).await,
        Some(Command::Conversations { command }) => match command.unwrap_or(ConversationCommand::List) {
            ConversationCommand::List => cmd_list_conversations(&config).await,
            ConversationCommand::Delete { id } => cmd_delete_conversation(&config, &id).await,
        },
    }
}

fn open_session(config: &Config) -> Result<ChatSession> {
    let backend = create_backend(&config.backend).context("Failed to create backend client")?;
    Ok(ChatSession::new(backend, SessionOptions::from(config)))
}

/// Send one message against whatever model the backend has loaded
async fn cmd_ask(
    config: &Config,
    message: &str,
    attach: &[PathBuf],
    schema: Option<&std::path::Path>,
) -> Result<()> {
    let session = open_session(config)?;
    repl::apply_context(&session, attach, schema).await?;

    let reply = session
        .submit_turn(message)
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;

    println!("{}", reply.content);
    Ok(())
}

async fn cmd_models(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    let models = session
        .list_models()
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;
    repl::print_models(&models);
    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    let health = session
        .health()
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;
    println!(
        "Backend: {} ({})",
        health.status.as_deref().unwrap_or("ok").green(),
        config.backend.base_url
    );
    if health.offline {
        println!("Mode:    {}", "offline".dimmed());
    }

    let state = session
        .refresh_status()
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;
    println!("{}", repl::format_model_state(&state));
    Ok(())
}

async fn cmd_load(config: &Config, name: &str) -> Result<()> {
    let session = open_session(config)?;
    println!("Loading {}...", name);
    session
        .load_model(name)
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;
    println!("{}", repl::format_model_state(&session.model_state()));
    Ok(())
}

async fn cmd_list_conversations(config: &Config) -> Result<()> {
    let session = open_session(config)?;
    let conversations = session
        .list_conversations()
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;

    if conversations.is_empty() {
        println!("{}", "No stored conversations.".dimmed());
        return Ok(());
    }

    for conv in conversations {
        let title = conv.title.as_deref().unwrap_or("(untitled)");
        let mut line = format!(
            "  {}  {}  {} messages",
            conv.id.as_str().yellow(),
            title,
            conv.messages.len()
        );
        if let Some(parent) = &conv.parent_id {
            line.push_str(&format!("  (branch of {})", parent).dimmed().to_string());
        }
        println!("{}", line);
    }
    Ok(())
}

async fn cmd_delete_conversation(config: &Config, id: &str) -> Result<()> {
    let session = open_session(config)?;
    session
        .delete_conversation(&ConversationId::new(id))
        .await
        .map_err(|e| eyre::eyre!(repl::describe_error(&e)))?;
    println!("Deleted {}", id);
    Ok(())
}
