//! Command handlers.
//!
//! Each sub-module groups related commands by domain. Input lines are parsed
//! into a [`Command`] and dispatched from `lib.rs`.

pub mod messaging;
pub mod profile;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Delete(String),
    SetDisplayName(String),
    Quit,
    /// Blank line: nothing to do.
    Nothing,
    /// An unknown or malformed slash command, with a usage hint.
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Nothing;
        }
        if !trimmed.starts_with('/') {
            return Self::Send(line.to_string());
        }

        let (name, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (trimmed, ""),
        };

        match name {
            "/quit" | "/exit" => Self::Quit,
            "/delete" if !arg.is_empty() => Self::Delete(arg.to_string()),
            "/delete" => Self::Invalid("usage: /delete <message-id>".into()),
            "/profile" if !arg.is_empty() => Self::SetDisplayName(arg.to_string()),
            "/profile" => Self::Invalid("usage: /profile <display name>".into()),
            other => Self::Invalid(format!("unknown command: {other}")),
        }
    }
}
