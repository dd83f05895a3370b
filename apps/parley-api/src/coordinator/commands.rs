//! Chat-line grammar.
//!
//! The first token is case-sensitive and space-delimited. Anything without a
//! leading `/` is a room broadcast.

use crate::error::CoordinatorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Plain text: broadcast to every member of the sender's current room.
    Broadcast(&'a str),
    /// `/pm <username> <message...>`
    Private { to: &'a str, text: &'a str },
    /// `/rooms`
    Rooms,
    /// `/join <room>`
    Join(&'a str),
    /// `/help`
    Help,
}

pub fn parse(line: &str) -> Result<Command<'_>, CoordinatorError> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(Command::Broadcast(line));
    }

    let (token, rest) = match line.split_once(' ') {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (line, ""),
    };

    match token {
        "/pm" => {
            let usage = || CoordinatorError::InvalidPayload("usage: /pm <username> <message>".to_string());
            let (to, text) = rest.split_once(' ').ok_or_else(usage)?;
            let text = text.trim_start();
            if to.is_empty() || text.is_empty() {
                return Err(usage());
            }
            Ok(Command::Private { to, text })
        }
        "/rooms" => Ok(Command::Rooms),
        "/join" => {
            if rest.is_empty() {
                return Err(CoordinatorError::InvalidPayload(
                    "usage: /join <room>".to_string(),
                ));
            }
            Ok(Command::Join(rest))
        }
        "/help" => Ok(Command::Help),
        other => Err(CoordinatorError::UnknownCommand(other.to_string())),
    }
}
