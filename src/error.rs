//! Error taxonomy for command definition, parsing, and dispatch.
//!
//! Usage problems surface as [`CommandError::Usage`] without a traceback,
//! configuration mistakes (an empty command class, an unsupported parser
//! operation) surface as `NotImplemented`/`NotSupported`, and clean exit
//! requests (`--help`, `--version`, explicit exit codes) travel as
//! [`CommandError::Exit`] so callers can normalize them into the host
//! process-exit convention.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad or missing arguments, unknown flags, mutually exclusive flags
    /// supplied together. Printed to the error stream without a traceback.
    #[error("{0}")]
    Usage(String),

    /// A command name that is not present in the registry
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A subcommand path segment that does not exist in the command tree
    #[error("no such command \"{0}\"")]
    NoSuchCommand(String),

    /// A subcommand path that addresses a group or callback rather than an
    /// invocable leaf command
    #[error("\"{0}\" is not a command")]
    NotACommand(String),

    /// Configuration error: a command class that registers nothing, or a
    /// handler hook left unimplemented
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// An operation the parser facade deliberately refuses
    #[error("{0} is not supported: parameters are declared, not registered imperatively")]
    NotSupported(&'static str),

    /// Clean exit request. Carries the process exit code; callers that do
    /// not want the process to terminate must catch it explicitly.
    #[error("exit: {0}")]
    Exit(i32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CommandError {
    /// Exit code the host process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Exit(code) => *code,
            _ => 1,
        }
    }

    /// True for `--help`/`--version` style exits that are not errors.
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, CommandError::Exit(_))
    }
}
