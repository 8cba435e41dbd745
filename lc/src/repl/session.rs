//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use super::commands::SlashCommand;
use crate::backend::{DocumentId, ModelInfo};
use crate::session::{ChatError, ChatSession, ErrorKind, ModelState, Role, SchemaOutcome};

/// Interactive REPL session
pub struct ReplSession {
    session: Arc<ChatSession>,
}

impl ReplSession {
    pub fn new(session: Arc<ChatSession>) -> Self {
        Self { session }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(SlashCommand::parse(input)).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_user_input(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "LocalChat".bright_cyan().bold());
        println!("{}", format_model_state(&self.session.model_state()));
        let docs = self.session.documents().len();
        if docs > 0 {
            println!("{} document(s) attached", docs);
        }
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, command: SlashCommand) -> SlashResult {
        match command {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Quit => return SlashResult::Quit,
            SlashCommand::New => {
                self.session.start_new();
                println!("{}", "Started a new conversation.".dimmed());
            }
            SlashCommand::Branch(point) => match self.session.branch(point).await {
                Ok(child) => println!("{} {}", "Branched into".dimmed(), child.as_str().bright_white()),
                Err(e) => print_error(&e),
            },
            SlashCommand::Parent => match self.session.restore_parent() {
                Ok(Some(parent)) => println!("{} {}", "Back on".dimmed(), parent.as_str().bright_white()),
                Ok(None) => println!("{}", "Not on a branch.".dimmed()),
                Err(e) => print_error(&e),
            },
            SlashCommand::Attach(path) => match self.session.attach_file(&path).await {
                Ok(doc) => println!(
                    "{} {} ({})",
                    "Attached".green(),
                    doc.display_name,
                    doc.id.as_str().dimmed()
                ),
                Err(e) => print_error(&e),
            },
            SlashCommand::Detach(id) => {
                if self.session.remove_document(&DocumentId::new(id.as_str())) {
                    println!("{} {}", "Detached".dimmed(), id);
                } else {
                    println!("{} No document with id {}", "?".yellow(), id);
                }
            }
            SlashCommand::Docs => self.print_documents(),
            SlashCommand::SchemaShow => match self.session.schema() {
                Some(schema) => match serde_json::to_string_pretty(&schema) {
                    Ok(pretty) => println!("{}", pretty),
                    Err(e) => println!("{} {}", "Error:".red(), e),
                },
                None => println!("{}", "No schema set.".dimmed()),
            },
            SlashCommand::SchemaClear => {
                self.session.clear_schema();
                println!("{}", "Schema cleared.".dimmed());
            }
            SlashCommand::SchemaApply(raw) => match self.session.apply_schema(&raw) {
                Ok(SchemaOutcome::Applied) => println!("{}", "Schema applied.".green()),
                Ok(SchemaOutcome::Cleared) => println!("{}", "Schema cleared.".dimmed()),
                Err(e) => print_error(&e),
            },
            SlashCommand::Model(name) => {
                println!("{}", format!("Loading {}...", name).dimmed());
                match self.session.load_model(&name).await {
                    Ok(()) => println!("{}", format_model_state(&self.session.model_state())),
                    Err(e) => print_error(&e),
                }
            }
            SlashCommand::Models => match self.session.list_models().await {
                Ok(models) => print_models(&models),
                Err(e) => print_error(&e),
            },
            SlashCommand::Status => match self.session.refresh_status().await {
                Ok(state) => {
                    println!("{}", format_model_state(&state));
                    match self.session.identity() {
                        Some(id) => println!("Conversation: {}", id.as_str().bright_white()),
                        None => println!("Conversation: {}", "new".dimmed()),
                    }
                }
                Err(e) => print_error(&e),
            },
            SlashCommand::History => self.print_history(),
            SlashCommand::Lineage => self.print_lineage(),
            SlashCommand::Usage(usage) => println!("{} Usage: {}", "?".yellow(), usage),
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:18} Show this help", "/help".yellow());
        println!("  {:18} Exit", "/quit".yellow());
        println!("  {:18} Start a new conversation", "/new".yellow());
        println!("  {:18} Branch at turn N (default: latest)", "/branch [N]".yellow());
        println!("  {:18} Return to the conversation last branched from", "/parent".yellow());
        println!("  {:18} Upload and attach a document", "/attach PATH".yellow());
        println!("  {:18} Remove an attached document", "/detach ID".yellow());
        println!("  {:18} List attached documents", "/docs".yellow());
        println!("  {:18} Set, show or clear the output schema", "/schema [JSON]".yellow());
        println!("  {:18} Load a model", "/model NAME".yellow());
        println!("  {:18} List available models", "/models".yellow());
        println!("  {:18} Show model and conversation", "/status".yellow());
        println!("  {:18} Show conversation history", "/history".yellow());
        println!("  {:18} Show branch lineage", "/lineage".yellow());
        println!();
        println!("Press {} while waiting to cancel a reply.", "Ctrl+C".yellow());
        println!();
    }

    fn print_documents(&self) {
        let docs = self.session.documents();
        if docs.is_empty() {
            println!("{}", "No documents attached.".dimmed());
            return;
        }

        println!();
        println!("{}", "Attached Documents:".bright_cyan());
        for doc in docs {
            println!(
                "  {} {} ({} chars)",
                doc.id.as_str().yellow(),
                doc.display_name,
                doc.content.chars().count()
            );
        }
        println!();
    }

    fn print_history(&self) {
        let transcript = self.session.transcript();
        if transcript.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, turn) in transcript.iter().enumerate() {
            let role = match turn.role {
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            let preview: String = turn.content.chars().take(50).collect();
            let preview = if turn.content.chars().count() > 50 {
                format!("{}...", preview)
            } else {
                preview
            };
            println!("  {}. {}: {}", i + 1, role, preview);
        }
        println!();
    }

    fn print_lineage(&self) {
        let lineage = self.session.lineage();
        if lineage.is_empty() {
            println!("{}", "Not on a branch.".dimmed());
            return;
        }

        println!();
        println!("{}", "Lineage:".bright_cyan());
        for record in lineage {
            println!(
                "  {} -> {} at turn {}",
                record.parent.as_str(),
                record.child.as_str().bright_white(),
                record.branch_point
            );
        }
        println!();
    }

    /// Submit a turn; Ctrl+C cancels the outstanding request
    async fn process_user_input(&mut self, input: &str) {
        let session = self.session.clone();
        let turn = session.submit_turn(input);
        tokio::pin!(turn);

        println!("{}", "...".dimmed());
        let result = tokio::select! {
            result = &mut turn => result,
            _ = tokio::signal::ctrl_c() => {
                session.cancel_generation();
                turn.await
            }
        };

        match result {
            Ok(reply) => {
                let speaker = reply.model.as_deref().unwrap_or("Assistant");
                println!("{}", speaker.bright_blue().dimmed());
                println!("{}", reply.content);
                println!();
            }
            Err(e) => print_error(&e),
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}

/// Human-readable message for a failed operation
pub fn describe_error(err: &ChatError) -> String {
    match err.kind() {
        ErrorKind::BackendUnavailable => format!("The model service is down or unreachable ({})", err),
        ErrorKind::NoModelLoaded => "No model loaded. Use /model NAME or `lc load NAME` first.".to_string(),
        ErrorKind::GenerationInProgress => "Busy: wait for the current request to finish.".to_string(),
        ErrorKind::Cancelled => "Cancelled.".to_string(),
        _ => err.to_string(),
    }
}

fn print_error(err: &ChatError) {
    println!("{}", format_error(err));
}

/// Guard failures read as hints, backend failures as errors
fn format_error(err: &ChatError) -> String {
    if err.is_guard() {
        format!("{} {}", "!".yellow(), describe_error(err))
    } else {
        format!("{} {}", "Error:".red(), describe_error(err))
    }
}

pub fn format_model_state(state: &ModelState) -> String {
    match state {
        ModelState::Loaded { .. } => state.to_string().green().to_string(),
        ModelState::Loading { .. } => state.to_string().yellow().to_string(),
        ModelState::NoModel => state.to_string().dimmed().to_string(),
        ModelState::Error { .. } => state.to_string().red().to_string(),
    }
}

pub fn print_models(models: &[ModelInfo]) {
    if models.is_empty() {
        println!("{}", "No models available.".dimmed());
        return;
    }
    for model in models {
        println!(
            "  {:40} {:>6.1} GB  {}",
            model.filename.yellow(),
            model.size_gb,
            model.description.dimmed()
        );
    }
}
