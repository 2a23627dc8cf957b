use thiserror::Error;

use crate::Intent;

pub const COMMAND_MARKER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),
}

/// Turns a command-mode line into an intent. `Ok(None)` means there was
/// nothing to do.
pub fn interpret(line: &str) -> Result<Option<Intent>, CommandError> {
    let trimmed = line.trim();
    let command = trimmed
        .strip_prefix(COMMAND_MARKER)
        .unwrap_or(trimmed)
        .trim();

    if command.is_empty() {
        return Ok(None);
    }

    match command.parse::<i64>() {
        Ok(page) if page > 0 => match usize::try_from(page - 1) {
            Ok(page) => Ok(Some(Intent::JumpToPage { page })),
            Err(_) => Err(CommandError::Unknown(command.to_string())),
        },
        _ => Err(CommandError::Unknown(command.to_string())),
    }
}
