//! Line sources for the read-dispatch loop.
//!
//! Interactive terminals get a `rustyline` editor; pipes, scripts and tests
//! use [`PlainReader`] over any `BufRead`.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// What one read from a [`LineReader`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line, without its trailing line break.
    Line(String),
    /// The user interrupted the current line (Ctrl-C in the editor).
    Interrupted,
    /// No more input.
    Eof,
}

/// Prints the prompt and blocks for the next line.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<Input>;
}

/// Line editor for interactive use.
///
/// Accepted lines are also added to the editor's in-memory recall list for the
/// arrow keys. That list is never written to disk.
pub struct EditorReader {
    editor: DefaultEditor,
}

impl EditorReader {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("failed to initialise line editor")?;
        Ok(Self { editor })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(err) => Err(err).context("failed to read input line"),
        }
    }
}

/// Reads lines from any buffered reader, writing the prompt to `prompt_out`.
pub struct PlainReader<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> PlainReader<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineReader for PlainReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<Input> {
        self.prompt_out.write_all(prompt.as_bytes())?;
        self.prompt_out.flush()?;

        let mut raw = Vec::new();
        let read = self
            .input
            .read_until(b'\n', &mut raw)
            .context("failed to read input line")?;
        if read == 0 {
            return Ok(Input::Eof);
        }
        // Bytes that are not UTF-8 become U+FFFD; the line is still dispatched.
        let line = String::from_utf8_lossy(&raw);
        Ok(Input::Line(crate::tokenizer::strip_line_break(&line).to_string()))
    }
}
