//! Starting external programs.
//!
//! [`ProcessLauncher`] is the seam between the read-dispatch loop and the OS.
//! [`SystemLauncher`] implements it on `std::process::Command`: the program is
//! resolved on the shell's `PATH`, foreground children are waited for before
//! `spawn` returns, and background children are handed to the [`JobTable`].

use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::config::MAX_JOBS;
use crate::env::Environment;
use crate::error::LaunchError;
use crate::jobs::{FinishedJob, JobId, JobInfo, JobTable};
use crate::tokenizer::{ArgumentVector, BACKGROUND_MARKER};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Outcome of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launched {
    /// A foreground child ran to completion with this status.
    Completed(ExitCode),
    /// A background child was registered as job `id`.
    Detached { id: JobId, pid: u32 },
}

pub trait ProcessLauncher {
    /// Start `argv` as a child process. With `background == false` this
    /// returns only after the child has terminated.
    ///
    /// `argv` must not carry the trailing `&`; the caller strips it and passes
    /// `background` instead.
    fn spawn(&mut self, argv: &ArgumentVector, background: bool) -> Result<Launched, LaunchError>;

    /// Background jobs that terminated since the previous call.
    fn reap(&mut self) -> Vec<FinishedJob> {
        Vec::new()
    }

    /// Background jobs that are still running.
    fn jobs(&self) -> Vec<JobInfo> {
        Vec::new()
    }
}

/// Launches real OS processes.
pub struct SystemLauncher {
    env: Environment,
    jobs: JobTable,
}

impl SystemLauncher {
    pub fn new(env: Environment) -> Self {
        Self::with_max_jobs(env, MAX_JOBS)
    }

    pub fn with_max_jobs(env: Environment, max_jobs: usize) -> Self {
        Self {
            env,
            jobs: JobTable::new(max_jobs),
        }
    }
}

impl ProcessLauncher for SystemLauncher {
    fn spawn(&mut self, argv: &ArgumentVector, background: bool) -> Result<Launched, LaunchError> {
        let program = argv.program();
        if background && self.jobs.is_full() {
            return Err(LaunchError::TooManyJobs {
                command: program.to_string(),
                max: self.jobs.max_jobs(),
            });
        }

        let path = self
            .env
            .resolve(program)
            .ok_or_else(|| LaunchError::NotFound(program.to_string()))?;
        debug!(program, path = %path.display(), background, "resolved program");

        let mut cmd = Command::new(&*path);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(program);
        }
        cmd.args(argv.args())
            .envs(self.env.vars.iter())
            .current_dir(&self.env.current_dir);
        if background {
            cmd.stdin(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LaunchError::from_spawn(program, e))?;
        let pid = child.id();
        info!(program, pid, background, "launched");

        if background {
            let id = self.jobs.insert(child, &describe(argv))?;
            return Ok(Launched::Detached { id, pid });
        }

        let status = child.wait().map_err(|e| LaunchError::Spawn {
            command: program.to_string(),
            source: e,
        })?;
        let code = exit_code(status);
        debug!(program, pid, code, "foreground job finished");
        Ok(Launched::Completed(code))
    }

    fn reap(&mut self) -> Vec<FinishedJob> {
        self.jobs.reap()
    }

    fn jobs(&self) -> Vec<JobInfo> {
        self.jobs.list()
    }
}

/// Command text shown for a background job.
fn describe(argv: &ArgumentVector) -> String {
    let mut text = argv.tokens().join(" ");
    text.push(' ');
    text.push_str(BACKGROUND_MARKER);
    text
}

/// Shell-convention status of a terminated child: its exit code, or
/// `128 + signal` when it was killed by a signal.
pub fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = exit_status.signal() {
        128 + signal
    } else if exit_status.core_dumped() {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}
