//! Helpers shared by the unit tests.

use std::io::{Cursor, Sink};
use std::sync::Once;

use crate::ReplController;
use crate::config::{LOG_ENV, ShellConfig};
use crate::error::LaunchError;
use crate::input::PlainReader;
use crate::jobs::{FinishedJob, JobId, JobInfo};
use crate::launcher::{Launched, ProcessLauncher};
use crate::tokenizer::ArgumentVector;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once, when `OSH_LOG` is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var(LOG_ENV).is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_env(LOG_ENV))
                .try_init()
                .ok();
        }
    });
}

/// Launcher that records what it was asked to run instead of running it.
///
/// Programs that are empty or start with `missing` fail as not found.
/// Background launches stay "running" until the next [`reap`](ProcessLauncher::reap),
/// which reports them as finished with status 0.
#[derive(Default)]
pub struct RecordingLauncher {
    pub launches: Vec<(Vec<String>, bool)>,
    running: Vec<JobInfo>,
}

impl RecordingLauncher {
    /// Every launched command line, space-joined.
    pub fn programs(&self) -> Vec<String> {
        self.launches.iter().map(|(argv, _)| argv.join(" ")).collect()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn(&mut self, argv: &ArgumentVector, background: bool) -> Result<Launched, LaunchError> {
        self.launches.push((argv.tokens().to_vec(), background));
        let program = argv.program();
        if program.is_empty() || program.starts_with("missing") {
            return Err(LaunchError::NotFound(program.to_string()));
        }
        if !background {
            return Ok(Launched::Completed(0));
        }

        let id: JobId = (1..)
            .find(|id| !self.running.iter().any(|j| j.id == *id))
            .unwrap_or(1);
        let pid = 1000 + id as u32;
        self.running.push(JobInfo {
            id,
            pid,
            command: format!("{} &", argv.tokens().join(" ")),
        });
        Ok(Launched::Detached { id, pid })
    }

    fn reap(&mut self) -> Vec<FinishedJob> {
        self.running
            .drain(..)
            .map(|job| FinishedJob {
                id: job.id,
                pid: job.pid,
                command: job.command,
                status: 0,
            })
            .collect()
    }

    fn jobs(&self) -> Vec<JobInfo> {
        self.running.clone()
    }
}

pub type ScriptedShell = ReplController<PlainReader<Cursor<Vec<u8>>, Sink>, RecordingLauncher, Vec<u8>>;

/// A controller reading `script` line by line, launching nothing.
pub fn scripted_shell(script: impl AsRef<[u8]>) -> ScriptedShell {
    ReplController::new(
        ShellConfig::default(),
        PlainReader::new(Cursor::new(script.as_ref().to_vec()), std::io::sink()),
        RecordingLauncher::default(),
        Vec::new(),
    )
}
