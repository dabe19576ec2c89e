//! Line commands understood by the terminal session.

use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  set <text>     replace the document content
  append <text>  append text to the document
  save           save now, skipping the debounce
  sync           sync the queued offline edit now
  offline        simulate losing the connection
  online         simulate the connection coming back
  status         show save status and connectivity
  queue          list edits waiting to sync
  clear          drop every offline record
  help           show this message
  quit           save and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(String),
    Append(String),
    Save,
    Sync,
    Offline,
    Online,
    Status,
    Queue,
    Clear,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("'{0}' takes no arguments")]
    UnexpectedArgument(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let (name, rest) = match line.trim_start().split_once(' ') {
            Some((name, rest)) => (name, Some(rest)),
            None => (line.trim(), None),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "set" => return Ok(Command::Set(rest.unwrap_or_default().to_string())),
            "append" => return Ok(Command::Append(rest.unwrap_or_default().to_string())),
            "save" => Command::Save,
            "sync" => Command::Sync,
            "offline" => Command::Offline,
            "online" => Command::Online,
            "status" => Command::Status,
            "queue" => Command::Queue,
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(name.to_string())),
        };

        match rest.map(str::trim) {
            Some(arg) if !arg.is_empty() => Err(CommandError::UnexpectedArgument(name.to_string())),
            _ => Ok(command),
        }
    }
}
