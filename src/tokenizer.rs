//! Splitting a raw input line into an argument vector.
//!
//! The rules are deliberately simpler than a POSIX shell: there is no quoting,
//! escaping or expansion. A single space separates tokens and scanning goes on;
//! any other whitespace (tab, carriage return, line break) ends the line.

use crate::error::TokenizeError;

/// Token that, when it is the last one on a line, requests background execution.
pub const BACKGROUND_MARKER: &str = "&";

/// Ordered, owned tokens of one input line. The first token names the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentVector {
    tokens: Vec<String>,
}

impl ArgumentVector {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Name of the program to run; empty when the line was empty or started
    /// with whitespace.
    pub fn program(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when the last token is exactly [`BACKGROUND_MARKER`].
    pub fn is_background(&self) -> bool {
        self.tokens.len() > 1 && self.tokens.last().is_some_and(|t| t == BACKGROUND_MARKER)
    }

    /// The vector handed to the launcher: the trailing `&`, if any, removed.
    pub fn without_background_marker(&self) -> ArgumentVector {
        let mut tokens = self.tokens.clone();
        if self.is_background() {
            tokens.pop();
        }
        ArgumentVector { tokens }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    ReadingToken,
    Done,
}

struct TokenizerFsm<'a> {
    input: std::str::Chars<'a>,
    state: ScanState,
    tokens: Vec<String>,
    buffer: String,
}

impl<'a> TokenizerFsm<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            input: line.chars(),
            state: ScanState::Start,
            tokens: Vec::new(),
            buffer: String::new(),
        }
    }

    fn run(mut self) -> Vec<String> {
        while self.state != ScanState::Done {
            match self.input.next() {
                Some(ch) => match self.state {
                    ScanState::Start => self.handle_start(ch),
                    ScanState::ReadingToken => self.handle_token(ch),
                    ScanState::Done => unreachable!(),
                },
                None => self.state = ScanState::Done,
            }
        }
        self.finish_token();
        self.tokens
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            ' ' => {
                // Leading space: the line's program name is the empty string.
                if self.tokens.is_empty() {
                    self.tokens.push(String::new());
                }
            }
            c if c.is_whitespace() => self.state = ScanState::Done,
            c => {
                self.buffer.push(c);
                self.state = ScanState::ReadingToken;
            }
        }
    }

    fn handle_token(&mut self, ch: char) {
        match ch {
            ' ' => {
                self.finish_token();
                self.state = ScanState::Start;
            }
            c if c.is_whitespace() => self.state = ScanState::Done,
            c => self.buffer.push(c),
        }
    }

    fn finish_token(&mut self) {
        if !self.buffer.is_empty() || self.tokens.is_empty() {
            self.tokens.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// Split `line` into an [`ArgumentVector`], enforcing the line and token limits.
///
/// The line may still carry its trailing line break. An empty line, or one
/// starting with whitespace, yields an empty first token; dispatching it fails
/// at launch like any other unknown program.
pub fn tokenize(line: &str, max_line: usize, max_args: usize) -> Result<ArgumentVector, TokenizeError> {
    let body = strip_line_break(line);
    if body.len() > max_line {
        return Err(TokenizeError::LineTooLong {
            len: body.len(),
            max: max_line,
        });
    }

    let tokens = TokenizerFsm::new(body).run();
    if tokens.len() > max_args {
        return Err(TokenizeError::TooManyArguments { max: max_args });
    }
    Ok(ArgumentVector::new(tokens))
}

/// The line without its trailing `\n` or `\r\n`.
pub fn strip_line_break(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
