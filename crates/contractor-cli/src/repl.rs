//! Chat REPL input handling

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Plain text for the assistant
    Message(String),
    /// Show the pending contract draft
    Draft,
    /// Print the pending draft and clear it
    Apply,
    /// Switch to a session, or list sessions when no id is given
    Session(Option<String>),
    History,
    /// Switch model, or show the current one when no name is given
    Model(Option<String>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = input.strip_prefix('/') else {
            return ReplCommand::Message(input.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
            None => (command, None),
        };

        match name {
            "draft" => ReplCommand::Draft,
            "apply" => ReplCommand::Apply,
            "session" => ReplCommand::Session(arg),
            "history" => ReplCommand::History,
            "model" => ReplCommand::Model(arg),
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => ReplCommand::Unknown(other.to_string()),
        }
    }
}

pub const HELP: &str = "Commands:
  /draft            Show the pending contract draft
  /apply            Print the pending draft and clear it
  /session [id]     Switch session (lists sessions without an id)
  /history          Show this session's messages
  /model [name]     Switch model (shows the current one without a name)
  /quit             Exit";
