//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LocalChat - offline chat against a local model server
#[derive(Parser)]
#[command(
    name = "lc",
    about = "Chat with a locally hosted model: documents, JSON schemas and branching conversations",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to `chat`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive chat session
    Chat {
        /// Model to load before chatting
        #[arg(short, long)]
        model: Option<String>,

        /// Files to attach as document context
        #[arg(short, long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,

        /// File holding a JSON schema to constrain output
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,
    },

    /// Send a single message and print the answer
    Ask {
        /// Message to send
        message: String,

        /// Files to attach as document context
        #[arg(short, long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,

        /// File holding a JSON schema to constrain output
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,
    },

    /// List models available on the backend
    Models,

    /// Show backend health and the loaded model
    Status,

    /// Load a model on the backend
    Load {
        /// Model file name as listed by `models`
        name: String,
    },

    /// Manage stored conversations
    Conversations {
        #[command(subcommand)]
        command: Option<ConversationCommand>,
    },
}

/// Conversation management subcommands
#[derive(Debug, Subcommand)]
pub enum ConversationCommand {
    /// List stored conversations
    List,

    /// Delete a stored conversation
    Delete {
        /// Conversation ID
        id: String,
    },
}
