//! `osh`: a small interactive command shell with a bounded history.
//!
//! The shell reads one line at a time, splits it on spaces, and either handles
//! it as a built-in (`exit`, `quit`, `history`, `jobs`, `!!`, `!N`) or starts
//! the named program. External commands are recorded in a ten-entry ring that
//! `!!` and `!N` replay from. A trailing `&` runs the program in the
//! background; background jobs are tracked and reported when they finish.
//!
//! The main entry point is [`ReplController`]. Its collaborators sit behind
//! small seams so they can be swapped in tests: [`input::LineReader`] for the
//! line source and [`launcher::ProcessLauncher`] for process creation.

pub mod config;
pub mod env;
pub mod error;
pub mod history;
pub mod input;
pub mod jobs;
pub mod launcher;
mod repl;
pub mod tokenizer;

#[cfg(test)]
mod test_support;

/// Re-export of the read-dispatch loop.
///
/// See [`ReplController`] for the high-level API and examples.
pub use repl::{ReplController, ReplState};
