//! Fixed limits and runtime options of the shell.
//!
//! Nothing here is read from disk: history is never persisted and its capacity
//! is part of the shell's contract, so the only knobs are the ones the binary
//! derives from its command line.

/// Prompt printed before every line is read.
pub const PROMPT: &str = "osh> ";

/// Number of commands kept by the history ring.
pub const HISTORY_CAPACITY: usize = 10;

/// Longest accepted input line, in bytes, not counting the line break.
pub const MAX_LINE: usize = 80;

/// Largest number of tokens one line may produce.
pub const MAX_ARGS: usize = MAX_LINE / 2 + 1;

/// Largest number of background jobs tracked at once.
pub const MAX_JOBS: usize = 32;

/// Environment variable holding the `tracing` filter directive.
pub const LOG_ENV: &str = "OSH_LOG";

/// Runtime options for one shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    pub history_capacity: usize,
    pub max_line: usize,
    pub max_args: usize,
    pub max_jobs: usize,
    /// Read from stdin without the line editor.
    pub plain: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: PROMPT.to_string(),
            history_capacity: HISTORY_CAPACITY,
            max_line: MAX_LINE,
            max_args: MAX_ARGS,
            max_jobs: MAX_JOBS,
            plain: false,
        }
    }
}
