//! Background job table.
//!
//! Every background child is moved into a waiter thread that blocks on
//! [`Child::wait`] and reports the exit status over a channel. The table keeps
//! one record per running job; [`JobTable::reap`] drains the channel, removes
//! finished jobs and hands them back for the "Done" notification. The table is
//! bounded, so a shell that keeps launching background work cannot grow it
//! without limit.

use std::process::Child;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, warn};

use crate::error::LaunchError;
use crate::launcher::{ExitCode, exit_code};

pub type JobId = usize;

/// A running background job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub pid: u32,
    pub command: String,
}

/// A background job that has terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedJob {
    pub id: JobId,
    pub pid: u32,
    pub command: String,
    pub status: ExitCode,
}

struct Completion {
    id: JobId,
    status: ExitCode,
}

struct JobEntry {
    info: JobInfo,
    waiter: thread::JoinHandle<()>,
}

pub struct JobTable {
    jobs: Vec<JobEntry>,
    max_jobs: usize,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl JobTable {
    pub fn new(max_jobs: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            jobs: Vec::new(),
            max_jobs,
            tx,
            rx,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.max_jobs
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Register `child` as a background job and start waiting for it.
    ///
    /// The smallest unused job id is assigned. A child that cannot be
    /// registered is killed and reaped before the error is returned; callers
    /// check [`is_full`](Self::is_full) to avoid spawning it at all.
    pub fn insert(&mut self, child: Child, command: &str) -> Result<JobId, LaunchError> {
        if self.is_full() {
            discard(child);
            return Err(LaunchError::TooManyJobs {
                command: command.to_string(),
                max: self.max_jobs,
            });
        }

        let id = (1..)
            .find(|id| !self.jobs.iter().any(|j| j.info.id == *id))
            .unwrap_or(1);
        let pid = child.id();
        let tx = self.tx.clone();

        // The child is handed over only once the waiter thread exists.
        let (hand_off, take) = mpsc::channel::<Child>();
        let spawned = thread::Builder::new()
            .name(format!("osh-job-{id}"))
            .spawn(move || {
                let Ok(mut child) = take.recv() else {
                    return;
                };
                let status = match child.wait() {
                    Ok(status) => exit_code(status),
                    Err(e) => {
                        warn!(id, pid, error = %e, "waiting for background job failed");
                        -1
                    }
                };
                // The receiver only disappears when the shell itself is exiting.
                let _ = tx.send(Completion { id, status });
            });
        let waiter = match spawned {
            Ok(waiter) => waiter,
            Err(e) => {
                discard(child);
                return Err(LaunchError::Spawn {
                    command: command.to_string(),
                    source: e,
                });
            }
        };
        if let Err(mpsc::SendError(child)) = hand_off.send(child) {
            discard(child);
            let _ = waiter.join();
            return Err(LaunchError::Spawn {
                command: command.to_string(),
                source: std::io::Error::other("job waiter exited before taking the child"),
            });
        }

        debug!(id, pid, command, "background job registered");
        self.jobs.push(JobEntry {
            info: JobInfo {
                id,
                pid,
                command: command.to_string(),
            },
            waiter,
        });
        Ok(id)
    }

    /// Remove and return every job that finished since the last call.
    pub fn reap(&mut self) -> Vec<FinishedJob> {
        let mut finished = Vec::new();
        while let Ok(Completion { id, status }) = self.rx.try_recv() {
            let Some(index) = self.jobs.iter().position(|j| j.info.id == id) else {
                continue;
            };
            let entry = self.jobs.remove(index);
            if entry.waiter.join().is_err() {
                warn!(id, "background job waiter panicked");
            }
            debug!(id, status, "background job reaped");
            finished.push(FinishedJob {
                id,
                pid: entry.info.pid,
                command: entry.info.command,
                status,
            });
        }
        finished.sort_by_key(|job| job.id);
        finished
    }

    /// Jobs still running, in job id order.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.jobs.iter().map(|j| j.info.clone()).collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }
}

/// Kill and reap a child the table will not track.
fn discard(mut child: Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        debug!(pid, error = %e, "kill of untracked child failed");
    }
    if let Err(e) = child.wait() {
        warn!(pid, error = %e, "reaping untracked child failed");
    }
}
