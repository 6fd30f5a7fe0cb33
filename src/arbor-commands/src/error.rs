//! Error types for registration, lazy loading and command failures.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while building the command tree.
///
/// These are startup contract violations; the dispatch pipeline never
/// produces or catches them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Registration with an empty path.
    #[error("Command path must not be empty")]
    EmptyPath,

    /// A path segment is the empty string.
    #[error("Command path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// The path already has a handler or lazy import.
    #[error("Command '{0}' is already registered")]
    Duplicate(String),

    /// An alias collides with a registered sibling.
    #[error("Alias '{alias}' for command '{path}' collides with a registered command")]
    AliasConflict { alias: String, path: String },
}

/// Errors raised while resolving a lazily registered command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The module import itself failed.
    #[error("Failed to load command module '{source_name}': {message}")]
    Import {
        source_name: String,
        message: String,
    },

    /// The module has no export with the requested name.
    #[error("Command module '{source_name}' has no export named '{export}'")]
    MissingExport { source_name: String, export: String },

    /// The export exists but is not a command handler.
    #[error("Export '{export}' of command module '{source_name}' is not callable")]
    NotCallable { source_name: String, export: String },
}

/// Structured error raised by a handler, carrying the process exit code.
///
/// The message is printed verbatim and the run ends with `exit_code`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
    pub exit_code: i32,
}

impl CommandError {
    pub fn new(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }
}

/// One field-level problem reported by a flags validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Flag name, without leading dashes.
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ConfigurationError::Duplicate("user add".to_string()).to_string(),
            "Command 'user add' is already registered"
        );
        assert_eq!(
            CommandError::new(2, "disk full").to_string(),
            "disk full"
        );
        assert_eq!(
            FieldError::new("name", "expected a string").to_string(),
            "--name: expected a string"
        );
    }

    #[test]
    fn test_command_error_survives_anyhow() {
        let err: anyhow::Error = CommandError::new(4, "nope").into();
        let err = err.context("while running");
        let found = err.chain().find_map(|e| e.downcast_ref::<CommandError>());
        assert_eq!(found.map(|e| e.exit_code), Some(4));
    }
}
