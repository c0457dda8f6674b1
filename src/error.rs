//! Error types for the shell.
//!
//! Every error here is recovered inside the read-dispatch loop: it is printed
//! and the shell prompts again. Only I/O failures on the shell's own streams
//! escape [`ReplController::run`](crate::ReplController::run).

use std::io;
use thiserror::Error;

use crate::launcher::ExitCode;

/// Input lines the tokenizer refuses to split.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    /// The line is longer than the configured maximum.
    #[error("input line too long ({len} bytes, limit {max})")]
    LineTooLong { len: usize, max: usize },

    /// The line splits into more tokens than the configured maximum.
    #[error("too many arguments (limit {max})")]
    TooManyArguments { max: usize },
}

/// Rejected `!!` and `!N` requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// `N` is outside `1..=available`.
    #[error("Invalid history request: !{requested} ({available} commands available)")]
    InvalidIndex { requested: usize, available: usize },

    /// `!` followed by something that is not a positive decimal integer.
    #[error("Invalid history request: {0}")]
    Malformed(String),

    /// `!!` before any command was run.
    #[error("No commands in history")]
    Empty,
}

/// Failures to start an external program.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The program could not be found on the search path.
    #[error("{0}: command not found")]
    NotFound(String),

    /// The program exists but may not be executed.
    #[error("{0}: permission denied")]
    PermissionDenied(String),

    /// The background job table is full.
    #[error("{command}: too many background jobs (limit {max})")]
    TooManyJobs { command: String, max: usize },

    /// Any other OS-level failure to create the child process.
    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Classify an error returned by `Command::spawn` for `command`.
    pub fn from_spawn(command: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound(command.to_string()),
            io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied(command.to_string()),
            _ => LaunchError::Spawn {
                command: command.to_string(),
                source: err,
            },
        }
    }

    /// Status a POSIX shell would report for this failure:
    /// 127 = command not found, 126 = not executable, 1 = anything else.
    pub fn exit_status(&self) -> ExitCode {
        match self {
            LaunchError::NotFound(_) => 127,
            LaunchError::PermissionDenied(_) => 126,
            LaunchError::TooManyJobs { .. } | LaunchError::Spawn { .. } => 1,
        }
    }
}
