use std::io::Write;

use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use tracing::{debug, info, trace, warn};

use crate::config::ShellConfig;
use crate::error::HistoryError;
use crate::history::HistoryStore;
use crate::input::{Input, LineReader};
use crate::launcher::{ExitCode, Launched, ProcessLauncher};
use crate::tokenizer::{ArgumentVector, strip_line_break, tokenize};

/// Where the read-dispatch loop currently is.
///
/// `Stopped` is terminal and only entered from `Dispatching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    Prompting,
    Reading,
    Dispatching,
    Executing,
    Builtin,
    Stopped,
}

/// Commands handled by the controller itself. None of them is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    History,
    Jobs,
    ReplayLast,
    ReplayNth(usize),
}

impl Builtin {
    /// Recognise a built-in by the line's first token.
    ///
    /// `None` means the token names an external program. A `!` request that
    /// is not `!!` or `!<digits>` is reported as malformed. Numbers too large
    /// for `usize` saturate, so they fail the range check instead.
    fn parse(program: &str) -> Option<Result<Builtin, HistoryError>> {
        let builtin = match program {
            "history" => Builtin::History,
            "jobs" => Builtin::Jobs,
            "!!" => Builtin::ReplayLast,
            _ => {
                let digits = program.strip_prefix('!')?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Some(Err(HistoryError::Malformed(program.to_string())));
                }
                Builtin::ReplayNth(digits.parse().unwrap_or(usize::MAX))
            }
        };
        Some(Ok(builtin))
    }
}

#[derive(FromArgs)]
/// List the retained history, oldest first. `!N` runs the N-th line.
struct HistoryArgs {}

#[derive(FromArgs)]
/// List running background jobs.
struct JobsArgs {}

/// The interactive shell: prompts, reads a line, dispatches it to a built-in
/// or to the [`ProcessLauncher`], and records external commands in the
/// [`HistoryStore`].
///
/// All mutable shell state lives here and is owned by one instance.
///
/// Example
/// ```
/// use osh::ReplController;
/// use osh::config::ShellConfig;
/// use osh::input::PlainReader;
/// use osh::launcher::SystemLauncher;
/// use osh::env::Environment;
///
/// let input = PlainReader::new(std::io::Cursor::new("history\nexit\n"), std::io::sink());
/// let mut sh = ReplController::new(
///     ShellConfig::default(),
///     input,
///     SystemLauncher::new(Environment::new()),
///     Vec::new(),
/// );
/// sh.run().unwrap();
/// assert!(sh.history().is_empty());
/// ```
pub struct ReplController<R, L, W> {
    config: ShellConfig,
    input: R,
    launcher: L,
    out: W,
    history: HistoryStore,
    state: ReplState,
    last_status: ExitCode,
}

impl<R: LineReader, L: ProcessLauncher, W: Write> ReplController<R, L, W> {
    pub fn new(config: ShellConfig, input: R, launcher: L, out: W) -> Self {
        let history = HistoryStore::with_capacity(config.history_capacity);
        Self {
            config,
            input,
            launcher,
            out,
            history,
            state: ReplState::Prompting,
            last_status: 0,
        }
    }

    pub fn state(&self) -> ReplState {
        self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Status of the last external command, or of its launch failure.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Run the loop until `exit`, `quit` or end of input.
    ///
    /// Command errors are printed and the loop goes on; only I/O errors on the
    /// shell's own input and output are returned.
    pub fn run(&mut self) -> Result<()> {
        info!("shell started");
        while self.state != ReplState::Stopped {
            self.report_finished_jobs()?;
            self.transition(ReplState::Prompting);
            self.out.flush()?;

            self.transition(ReplState::Reading);
            match self.input.read_line(&self.config.prompt)? {
                Input::Line(line) => self.dispatch(&line)?,
                Input::Interrupted => debug!("line interrupted"),
                Input::Eof => {
                    writeln!(self.out)?;
                    self.transition(ReplState::Dispatching);
                    self.transition(ReplState::Stopped);
                }
            }
        }
        self.out.flush()?;

        let running = self.launcher.jobs();
        if !running.is_empty() {
            info!(count = running.len(), "leaving background jobs running");
        }
        info!(commands_run = self.history.commands_run(), "shell stopped");
        Ok(())
    }

    /// Handle one input line.
    pub fn dispatch(&mut self, line: &str) -> Result<()> {
        self.transition(ReplState::Dispatching);
        let line = strip_line_break(line);
        let argv = match tokenize(line, self.config.max_line, self.config.max_args) {
            Ok(argv) => argv,
            Err(e) => {
                warn!(error = %e, "rejected input line");
                writeln!(self.out, "osh: {e}")?;
                return Ok(());
            }
        };

        if matches!(argv.program(), "exit" | "quit") {
            info!("exit requested");
            self.transition(ReplState::Stopped);
            return Ok(());
        }

        match Builtin::parse(argv.program()) {
            Some(Ok(builtin)) => {
                self.transition(ReplState::Builtin);
                self.run_builtin(builtin, &argv)?;
            }
            Some(Err(e)) => {
                self.transition(ReplState::Builtin);
                self.report_history_error(e)?;
            }
            None => {
                self.transition(ReplState::Executing);
                self.launch(&argv)?;
                self.history.record(line);
                debug!(commands_run = self.history.commands_run(), "recorded command");
            }
        }
        Ok(())
    }

    fn run_builtin(&mut self, builtin: Builtin, argv: &ArgumentVector) -> Result<()> {
        debug!(?builtin, "builtin");
        match builtin {
            Builtin::History => {
                if self.parse_args::<HistoryArgs>(argv)?.is_some() {
                    for entry in self.history.list() {
                        writeln!(self.out, "{} {}", entry.label, entry.line)?;
                    }
                }
            }
            Builtin::Jobs => {
                if self.parse_args::<JobsArgs>(argv)?.is_some() {
                    for job in self.launcher.jobs() {
                        writeln!(self.out, "[{}] {} {}", job.id, job.pid, job.command)?;
                    }
                }
            }
            Builtin::ReplayLast => match self.history.retrieve(0).map(str::to_string) {
                Some(line) => self.replay(line)?,
                None => self.report_history_error(HistoryError::Empty)?,
            },
            Builtin::ReplayNth(n) => match self.nth_oldest(n) {
                Ok(line) => self.replay(line)?,
                Err(e) => self.report_history_error(e)?,
            },
        }
        Ok(())
    }

    /// The `n`-th oldest retained command, `1 <= n <= len`.
    fn nth_oldest(&self, n: usize) -> Result<String, HistoryError> {
        let available = self.history.len();
        if n == 0 || n > available {
            return Err(HistoryError::InvalidIndex {
                requested: n,
                available,
            });
        }
        self.history
            .retrieve(available - n)
            .map(str::to_string)
            .ok_or(HistoryError::InvalidIndex {
                requested: n,
                available,
            })
    }

    /// Echo and run a stored line again. The replay itself is not recorded.
    fn replay(&mut self, line: String) -> Result<()> {
        writeln!(self.out, "{line}")?;
        let argv = match tokenize(&line, self.config.max_line, self.config.max_args) {
            Ok(argv) => argv,
            Err(e) => {
                writeln!(self.out, "osh: {e}")?;
                return Ok(());
            }
        };
        self.transition(ReplState::Executing);
        self.launch(&argv)
    }

    fn launch(&mut self, argv: &ArgumentVector) -> Result<()> {
        let background = argv.is_background();
        let argv = argv.without_background_marker();
        self.out.flush()?;

        match self.launcher.spawn(&argv, background) {
            Ok(Launched::Completed(code)) => {
                debug!(program = argv.program(), code, "command finished");
                self.last_status = code;
            }
            Ok(Launched::Detached { id, pid }) => {
                writeln!(self.out, "[{id}] {pid}")?;
                self.last_status = 0;
            }
            Err(e) => {
                warn!(error = %e, "launch failed");
                writeln!(self.out, "osh: {e}")?;
                self.last_status = e.exit_status();
            }
        }
        Ok(())
    }

    fn report_history_error(&mut self, err: HistoryError) -> Result<()> {
        debug!(error = %err, "history request rejected");
        writeln!(self.out, "Error: {err}")?;
        Ok(())
    }

    fn report_finished_jobs(&mut self) -> Result<()> {
        for job in self.launcher.reap() {
            if job.status == 0 {
                writeln!(self.out, "[{}]   Done   {}", job.id, job.command)?;
            } else {
                writeln!(self.out, "[{}]   Exit {}   {}", job.id, job.status, job.command)?;
            }
        }
        Ok(())
    }

    /// Parse built-in arguments; usage and `--help` output is printed and
    /// yields `None`.
    fn parse_args<T: FromArgs>(&mut self, argv: &ArgumentVector) -> Result<Option<T>> {
        let args: Vec<&str> = argv.args().iter().map(String::as_str).collect();
        match T::from_args(&[argv.program()], &args) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(EarlyExit { output, status }) => {
                self.out.write_all(output.as_bytes())?;
                if !output.ends_with('\n') {
                    writeln!(self.out)?;
                }
                debug!(failed = status.is_err(), "builtin usage printed");
                Ok(None)
            }
        }
    }

    fn transition(&mut self, next: ReplState) {
        trace!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedShell, init_test_logging, scripted_shell};

    fn output(sh: &ScriptedShell) -> String {
        String::from_utf8_lossy(sh.output()).into_owned()
    }

    fn recorded(sh: &ScriptedShell) -> Vec<String> {
        sh.history().list().iter().map(|e| e.line.to_string()).collect()
    }

    #[test]
    fn test_builtin_parse() {
        assert_eq!(Builtin::parse("history"), Some(Ok(Builtin::History)));
        assert_eq!(Builtin::parse("!!"), Some(Ok(Builtin::ReplayLast)));
        assert_eq!(Builtin::parse("!12"), Some(Ok(Builtin::ReplayNth(12))));
        assert_eq!(Builtin::parse("!0"), Some(Ok(Builtin::ReplayNth(0))));
        assert_eq!(
            Builtin::parse("!99999999999999999999"),
            Some(Ok(Builtin::ReplayNth(usize::MAX)))
        );
        assert_eq!(
            Builtin::parse("!abc"),
            Some(Err(HistoryError::Malformed("!abc".into())))
        );
        assert_eq!(Builtin::parse("!"), Some(Err(HistoryError::Malformed("!".into()))));
        assert_eq!(Builtin::parse("!+3"), Some(Err(HistoryError::Malformed("!+3".into()))));
        assert_eq!(Builtin::parse("ls"), None);
        assert_eq!(Builtin::parse(""), None);
    }

    #[test]
    fn test_scenario_history_and_replay() {
        init_test_logging();
        let mut sh = scripted_shell("echo A\necho B\necho C\nhistory\n!!\n!1\nexit\n");
        sh.run().unwrap();

        let out = output(&sh);
        assert!(out.contains("1 echo A\n2 echo B\n3 echo C\n"), "output was {out:?}");
        assert_eq!(
            sh.launcher().programs(),
            vec!["echo A", "echo B", "echo C", "echo C", "echo A"]
        );
        // Replays are echoed but not recorded.
        assert!(out.contains("echo C\necho A\n"));
        assert_eq!(sh.history().commands_run(), 3);
        assert_eq!(sh.state(), ReplState::Stopped);
    }

    #[test]
    fn test_builtins_are_not_recorded() {
        let mut sh = scripted_shell("ls\nhistory\n!!\n!1\njobs\n!9\n!x\nquit\n");
        sh.run().unwrap();
        assert_eq!(recorded(&sh), vec!["ls"]);
        assert_eq!(sh.history().commands_run(), 1);
    }

    #[test]
    fn test_out_of_range_replay_is_rejected() {
        let mut sh = scripted_shell("");
        for cmd in ["a", "b", "c"] {
            sh.dispatch(cmd).unwrap();
        }
        for request in ["!0", "!4", "!11"] {
            sh.dispatch(request).unwrap();
        }
        let out = output(&sh);
        assert_eq!(out.matches("Error: Invalid history request").count(), 3);
        assert_eq!(sh.launcher().programs(), vec!["a", "b", "c"]);
        assert_eq!(recorded(&sh), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_replay_beyond_capacity_is_rejected() {
        let mut sh = scripted_shell("");
        for i in 1..=11 {
            sh.dispatch(&format!("cmd{i}")).unwrap();
        }
        sh.dispatch("!11").unwrap();

        assert!(output(&sh).contains("Error: Invalid history request: !11 (10 commands available)"));
        assert_eq!(sh.launcher().launches.len(), 11);
        assert_eq!(sh.history().commands_run(), 11);
    }

    #[test]
    fn test_huge_replay_index_is_out_of_range() {
        let mut sh = scripted_shell("a\n!99999999999999999999\n");
        sh.run().unwrap();
        let out = output(&sh);
        assert!(out.contains("Error: Invalid history request"), "output was {out:?}");
        assert!(out.contains("(1 commands available)"));
        assert_eq!(sh.launcher().programs(), vec!["a"]);
    }

    #[test]
    fn test_invalid_utf8_line_keeps_shell_running() {
        let mut sh = scripted_shell(b"echo \xff\xfe\necho after\nexit\n");
        sh.run().unwrap();
        assert_eq!(
            sh.launcher().programs(),
            vec!["echo \u{FFFD}\u{FFFD}", "echo after"]
        );
        assert_eq!(sh.history().commands_run(), 2);
        assert_eq!(sh.state(), ReplState::Stopped);
    }

    #[test]
    fn test_replay_on_empty_history() {
        let mut sh = scripted_shell("!!\n!1\n");
        sh.run().unwrap();
        let out = output(&sh);
        assert!(out.contains("Error: No commands in history"));
        assert!(out.contains("Error: Invalid history request: !1 (0 commands available)"));
        assert!(sh.launcher().launches.is_empty());
    }

    #[test]
    fn test_malformed_history_token() {
        let mut sh = scripted_shell("!foo\n");
        sh.run().unwrap();
        assert!(output(&sh).contains("Error: Invalid history request: !foo"));
        assert!(sh.launcher().launches.is_empty());
    }

    #[test]
    fn test_ring_overwrite_through_dispatch() {
        let mut sh = scripted_shell("");
        for i in 1..=11 {
            sh.dispatch(&format!("cmd{i}")).unwrap();
        }
        let lines = recorded(&sh);
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "cmd2");

        sh.dispatch("history").unwrap();
        let out = output(&sh);
        assert!(out.starts_with("2 cmd2\n"));
        assert!(out.ends_with("11 cmd11\n"));

        // `!1` is the oldest retained command.
        sh.dispatch("!1").unwrap();
        assert_eq!(sh.launcher().programs().last().map(String::as_str), Some("cmd2"));
    }

    #[test]
    fn test_background_marker_is_stripped_and_flagged() {
        let mut sh = scripted_shell("sleep 5 &\n!!\n");
        sh.run().unwrap();
        let launches = &sh.launcher().launches;
        assert_eq!(launches.len(), 2);
        assert!(launches.iter().all(|(argv, background)| *background && argv == &["sleep", "5"]));
        assert_eq!(recorded(&sh), vec!["sleep 5 &"]);
        assert!(output(&sh).contains("[1] "));
    }

    #[test]
    fn test_launch_failure_is_reported_and_recorded() {
        let mut sh = scripted_shell("missing-program arg\n\n");
        sh.run().unwrap();
        let out = output(&sh);
        assert!(out.contains("osh: missing-program: command not found"));
        assert!(out.contains("osh: : command not found"));
        assert_eq!(recorded(&sh), vec!["missing-program arg", ""]);
        assert_eq!(sh.last_status(), 127);
    }

    #[test]
    fn test_overlong_line_is_rejected() {
        let long = "x".repeat(81);
        let mut sh = scripted_shell(&format!("{long}\n"));
        sh.run().unwrap();
        assert!(output(&sh).contains("osh: input line too long"));
        assert!(sh.history().is_empty());
        assert!(sh.launcher().launches.is_empty());
    }

    #[test]
    fn test_end_of_input_stops() {
        let mut sh = scripted_shell("ls");
        sh.run().unwrap();
        assert_eq!(sh.state(), ReplState::Stopped);
        assert_eq!(recorded(&sh), vec!["ls"]);
    }

    #[test]
    fn test_exit_stops_before_remaining_input() {
        let mut sh = scripted_shell("exit\nls\n");
        sh.run().unwrap();
        assert!(sh.launcher().launches.is_empty());
    }

    #[test]
    fn test_history_rejects_arguments() {
        let mut sh = scripted_shell("a\nhistory --bogus\n");
        sh.run().unwrap();
        let out = output(&sh);
        assert!(!out.contains("1 a\n"));
        assert!(out.contains("--bogus"));
    }

    #[test]
    fn test_history_help_explains_replay_numbering() {
        let mut sh = scripted_shell("history --help\n");
        sh.run().unwrap();
        let out = output(&sh);
        assert!(out.contains("Usage: history"), "output was {out:?}");
        assert!(out.contains("runs the N-th line"));
        assert!(sh.history().is_empty());
    }

    #[test]
    fn test_finished_jobs_are_reported_before_prompt() {
        let mut sh = scripted_shell("sleep 1 &\ntrue\n");
        sh.run().unwrap();
        let out = output(&sh);
        assert!(out.contains("[1]   Done   sleep 1 &"), "output was {out:?}");
    }

    #[test]
    fn test_jobs_lists_running_jobs() {
        let mut sh = scripted_shell("");
        sh.dispatch("sleep 9 &").unwrap();
        sh.dispatch("jobs").unwrap();
        assert!(output(&sh).contains("[1] 1001 sleep 9 &"));
    }

    #[cfg(unix)]
    mod system {
        use super::super::*;
        use crate::config::ShellConfig;
        use crate::env::Environment;
        use crate::input::PlainReader;
        use crate::launcher::SystemLauncher;
        use std::io::{Cursor, Sink};
        use std::time::{Duration, Instant};

        fn shell() -> ReplController<PlainReader<Cursor<&'static str>, Sink>, SystemLauncher, Vec<u8>> {
            ReplController::new(
                ShellConfig::default(),
                PlainReader::new(Cursor::new(""), std::io::sink()),
                SystemLauncher::new(Environment::new()),
                Vec::new(),
            )
        }

        #[test]
        fn test_background_returns_immediately() {
            let mut sh = shell();
            let started = Instant::now();
            sh.dispatch("sleep 5 &").unwrap();
            assert!(started.elapsed() < Duration::from_secs(3));
            assert_eq!(sh.launcher().jobs().len(), 1);
            assert_eq!(sh.history().retrieve(0), Some("sleep 5 &"));

            let pid = sh.launcher().jobs()[0].pid;
            std::process::Command::new("kill").arg(pid.to_string()).status().unwrap();
        }

        #[test]
        fn test_foreground_waits_for_child() {
            let mut sh = shell();
            let started = Instant::now();
            sh.dispatch("sleep 1").unwrap();
            assert!(started.elapsed() >= Duration::from_millis(900));
            assert_eq!(sh.last_status(), 0);
        }

        #[test]
        fn test_exit_status_of_replayed_command() {
            let mut sh = shell();
            sh.dispatch("false").unwrap();
            assert_eq!(sh.last_status(), 1);
            sh.dispatch("true").unwrap();
            sh.dispatch("!1").unwrap();
            assert_eq!(sh.last_status(), 1);
            assert_eq!(sh.history().commands_run(), 2);
        }
    }
}
