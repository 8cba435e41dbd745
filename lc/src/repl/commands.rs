//! Slash command parsing

use std::path::PathBuf;

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    /// Forget the current conversation
    New,
    /// Branch at the given turn count, or at the end
    Branch(Option<usize>),
    /// Return to the conversation the last branch left
    Parent,
    Attach(PathBuf),
    Detach(String),
    Docs,
    SchemaShow,
    SchemaClear,
    SchemaApply(String),
    Model(String),
    Models,
    Status,
    History,
    Lineage,
    /// Recognised command with bad arguments
    Usage(&'static str),
    Unknown(String),
}

impl SlashCommand {
    /// Parse a line starting with `/`
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        match cmd {
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            "/new" | "/clear" => Self::New,
            "/branch" => {
                if rest.is_empty() {
                    Self::Branch(None)
                } else {
                    match rest.parse::<usize>() {
                        Ok(n) => Self::Branch(Some(n)),
                        Err(_) => Self::Usage("/branch [N]"),
                    }
                }
            }
            "/parent" => Self::Parent,
            "/attach" if rest.is_empty() => Self::Usage("/attach PATH"),
            "/attach" => Self::Attach(PathBuf::from(rest)),
            "/detach" if rest.is_empty() => Self::Usage("/detach ID"),
            "/detach" => Self::Detach(rest.to_string()),
            "/docs" => Self::Docs,
            "/schema" => match rest {
                "" | "show" => Self::SchemaShow,
                "clear" => Self::SchemaClear,
                json => Self::SchemaApply(json.to_string()),
            },
            "/model" if rest.is_empty() => Self::Usage("/model NAME"),
            "/model" => Self::Model(rest.to_string()),
            "/models" => Self::Models,
            "/status" => Self::Status,
            "/history" => Self::History,
            "/lineage" => Self::Lineage,
            other => Self::Unknown(other.to_string()),
        }
    }
}
