//! Process supervisor.
//!
//! Runs one task as an external agent process to a terminal outcome. The
//! supervision loop waits on three things at once, using the capture
//! channel's `recv_timeout` as its clock:
//!
//! - the agent's exit,
//! - the task deadline,
//! - the run's [`CancelToken`].
//!
//! Whichever fires first decides the outcome. On every path the agent's
//! process group is torn down and confirmed gone before `execute` returns.

mod cancel;
mod capture;
mod command;
mod process;
#[cfg(target_os = "linux")]
mod procfs;

#[cfg(test)]
mod tests;

use crate::config::{AgentConfig, Config};
use crate::context::RunContext;
use crate::error::RunnerError;
use crate::fs::reset_dir;
use crate::signals::ActiveGroup;
use crate::task::{ExitOutcome, ExitSummary, TaskState, TaskUnit};
use capture::{CaptureEvent, OutputCapture, Stream, spawn_reader};
use chrono::{DateTime, Utc};
use command::Invocation;
use process::ProcessTree;
use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub use cancel::CancelToken;
pub use command::{ENV_ATTEMPT, ENV_TASK_ID};

/// Marker appended to the result of a cancelled task.
pub const CANCELLED_MARKER: &str = "TASK CANCELLED";

/// Error recorded when a process group outlives its reap timeout.
pub const SURVIVED_TERMINATION: &str = "process tree survived termination";

/// Execution limits and agent invocation for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub kill_grace: Duration,
    pub reap_timeout: Duration,
    pub agent: AgentConfig,
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.timeout(),
            poll_interval: Duration::from_millis(config.supervisor.poll_interval_ms),
            kill_grace: Duration::from_millis(config.supervisor.kill_grace_ms),
            reap_timeout: Duration::from_millis(config.supervisor.reap_timeout_ms),
            agent: config.agent.clone(),
        }
    }
}

/// Terminal outcome of one supervised execution.
#[derive(Debug, Clone)]
pub struct Execution {
    /// `Completed`, `Failed` or `TimedOut`.
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub summary: ExitSummary,
}

impl Execution {
    /// The agent never started because it could not be launched.
    pub fn is_spawn_failure(&self) -> bool {
        self.summary.outcome == ExitOutcome::SpawnFailed
    }
}

/// What ended the supervision loop.
#[derive(Debug)]
enum Ending {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(String),
}

/// Runs tasks one at a time under a base directory.
#[derive(Debug, Clone)]
pub struct Supervisor {
    ctx: RunContext,
    settings: SupervisorSettings,
}

impl Supervisor {
    pub fn new(ctx: RunContext, settings: SupervisorSettings) -> Self {
        Self { ctx, settings }
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Execute `task` to a terminal outcome.
    ///
    /// Never fails: every problem, from a bad command template to a process
    /// tree that refuses to die, is reported through the returned
    /// [`Execution`].
    pub fn execute(&self, task: &TaskUnit, cancel: &CancelToken) -> Execution {
        let started_at = Utc::now();
        let clock = Instant::now();
        let work_dir = self.ctx.task_work_dir(&task.id);

        if let Err(e) = reset_dir(&work_dir) {
            return self.without_process(
                started_at,
                clock,
                ExitOutcome::SupervisorError,
                e.to_string(),
                None,
            );
        }
        let mut capture = match OutputCapture::create(&self.ctx, &task.id) {
            Ok(capture) => capture,
            Err(e) => {
                return self.without_process(
                    started_at,
                    clock,
                    ExitOutcome::SupervisorError,
                    e.to_string(),
                    None,
                );
            }
        };

        let invocation = match command::build_invocation(&self.settings.agent, task, &work_dir) {
            Ok(invocation) => invocation,
            Err(msg) => {
                return self.without_process(
                    started_at,
                    clock,
                    ExitOutcome::SpawnFailed,
                    msg,
                    Some(capture),
                );
            }
        };

        let mut cmd = match self.command(&invocation, task, &work_dir) {
            Ok(cmd) => cmd,
            Err(msg) => {
                return self.without_process(
                    started_at,
                    clock,
                    ExitOutcome::SupervisorError,
                    msg,
                    Some(capture),
                );
            }
        };

        let mut tree = match ProcessTree::spawn(&mut cmd) {
            Ok(tree) => tree,
            Err(e) => {
                let err = RunnerError::SpawnError {
                    program: invocation.program.clone(),
                    reason: e.to_string(),
                };
                warn!(task = %task.id, error = %err, "agent failed to start");
                return self.without_process(
                    started_at,
                    clock,
                    ExitOutcome::SpawnFailed,
                    err.to_string(),
                    Some(capture),
                );
            }
        };
        let _group = ActiveGroup::register(tree.pgid());
        info!(
            task = %task.id,
            attempt = task.attempt,
            pgid = tree.pgid(),
            command = %invocation.rendered,
            "agent started"
        );

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = tree.child_mut().stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = tree.child_mut().stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let ending = self.supervise(&mut tree, &rx, &mut capture, clock, cancel);
        debug!(task = %task.id, ?ending, "supervision loop finished");

        // After a normal exit, helpers left in the group are torn down too.
        match ending {
            Ending::Exited(_) if !tree.alive() => {}
            _ => tree.terminate(self.settings.kill_grace),
        }
        let clean = tree.reap(self.settings.reap_timeout);
        if !clean {
            error!(
                task = %task.id,
                error = %RunnerError::TerminationFailed { pgid: tree.pgid() },
                "agent processes still alive after SIGKILL"
            );
        }

        self.drain(&rx, &mut capture, readers);

        let (mut state, mut outcome, mut note) = match &ending {
            Ending::Exited(status) if status.success() => {
                (TaskState::Completed, ExitOutcome::Exited, None)
            }
            Ending::Exited(_) => (TaskState::Failed, ExitOutcome::Exited, None),
            Ending::TimedOut => {
                let marker = timeout_marker(self.settings.timeout);
                warn!(task = %task.id, timeout = ?self.settings.timeout, "task timed out");
                capture.append_marker(&marker);
                (TaskState::TimedOut, ExitOutcome::TimedOut, Some(marker))
            }
            Ending::Cancelled => {
                info!(task = %task.id, "task cancelled");
                capture.append_marker(CANCELLED_MARKER);
                (
                    TaskState::Failed,
                    ExitOutcome::Cancelled,
                    Some(CANCELLED_MARKER.to_string()),
                )
            }
            Ending::WaitFailed(e) => {
                let msg = format!("failed to check agent process status: {}", e);
                capture.append_error(&msg);
                (TaskState::Failed, ExitOutcome::SupervisorError, Some(msg))
            }
        };

        if !clean {
            capture.append_error(SURVIVED_TERMINATION);
            state = TaskState::Failed;
            outcome = ExitOutcome::SupervisorError;
            note = Some(match note {
                Some(prev) => format!("{}; {}", prev, SURVIVED_TERMINATION),
                None => SURVIVED_TERMINATION.to_string(),
            });
        }

        let exit_code = match ending {
            Ending::Exited(status) => status.code(),
            _ => tree.status().and_then(|s| s.code()),
        };
        let (stdout, stderr) = capture.finish();

        info!(task = %task.id, %state, ?exit_code, "agent finished");
        Execution {
            state,
            started_at,
            ended_at: Utc::now(),
            summary: ExitSummary {
                exit_code,
                stdout,
                stderr,
                duration_ms: elapsed_ms(clock),
                outcome,
                clean_termination: clean,
                error: note,
            },
        }
    }

    /// Wait for exit, deadline or cancellation, recording output meanwhile.
    fn supervise(
        &self,
        tree: &mut ProcessTree,
        rx: &Receiver<CaptureEvent>,
        capture: &mut OutputCapture,
        clock: Instant,
        cancel: &CancelToken,
    ) -> Ending {
        let deadline = clock + self.settings.timeout;
        let mut streams_open = true;

        loop {
            let wait = self
                .settings
                .poll_interval
                .min(deadline.saturating_duration_since(Instant::now()));

            if streams_open {
                match rx.recv_timeout(wait) {
                    Ok(event) => capture.record(event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => streams_open = false,
                }
            } else {
                thread::sleep(wait);
            }

            match tree.try_wait() {
                Ok(Some(status)) => return Ending::Exited(status),
                Ok(None) => tree.track_escapees(),
                Err(e) => return Ending::WaitFailed(e.to_string()),
            }
            if Instant::now() >= deadline {
                return Ending::TimedOut;
            }
            if cancel.is_cancelled() {
                return Ending::Cancelled;
            }
        }
    }

    /// Collect output still in flight after the tree is gone.
    ///
    /// Readers are joined once both pipes hit EOF. A pipe held open by a
    /// process that escaped the group is abandoned after the reap timeout.
    fn drain(
        &self,
        rx: &Receiver<CaptureEvent>,
        capture: &mut OutputCapture,
        readers: Vec<JoinHandle<()>>,
    ) {
        let deadline = Instant::now() + self.settings.reap_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(event) => capture.record(event),
                Err(RecvTimeoutError::Disconnected) => {
                    for reader in readers {
                        let _ = reader.join();
                    }
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("agent output pipes still open after teardown; abandoning readers");
                    return;
                }
            }
        }
    }

    fn command(
        &self,
        invocation: &Invocation,
        task: &TaskUnit,
        work_dir: &Path,
    ) -> Result<Command, String> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(work_dir)
            .envs(&self.settings.agent.environment)
            .env(ENV_TASK_ID, &task.id)
            .env(ENV_ATTEMPT, task.attempt.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if self.settings.agent.stdin {
            let file = File::open(&task.source_path).map_err(|e| {
                format!(
                    "failed to open task artifact '{}': {}",
                    task.source_path.display(),
                    e
                )
            })?;
            cmd.stdin(Stdio::from(file));
        } else {
            cmd.stdin(Stdio::null());
        }

        Ok(cmd)
    }

    /// Outcome for an execution that ended before a process existed.
    fn without_process(
        &self,
        started_at: DateTime<Utc>,
        clock: Instant,
        outcome: ExitOutcome,
        error: String,
        capture: Option<OutputCapture>,
    ) -> Execution {
        let stderr = match capture {
            Some(mut capture) => {
                capture.append_error(&error);
                capture.finish().1
            }
            None => String::new(),
        };

        Execution {
            state: TaskState::Failed,
            started_at,
            ended_at: Utc::now(),
            summary: ExitSummary {
                stderr,
                duration_ms: elapsed_ms(clock),
                ..ExitSummary::failed_before_start(outcome, error)
            },
        }
    }
}

/// `TASK TIMED OUT AFTER {n} SECONDS`.
pub fn timeout_marker(timeout: Duration) -> String {
    format!("TASK TIMED OUT AFTER {} SECONDS", timeout.as_secs_f64())
}

fn elapsed_ms(clock: Instant) -> u64 {
    u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX)
}
