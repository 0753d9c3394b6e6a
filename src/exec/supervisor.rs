// src/exec/supervisor.rs

//! Runs one invocation plan from spawn to completion.
//!
//! Session states: `Idle -> Preparing -> Running -> {Draining | Cancelling}
//! -> Finished`.
//!
//! - The process is started in its own process group; the wait runs as its
//!   own Tokio task so it can be raced against the cancellation source.
//! - On cancellation the whole group gets an interrupt, then after the
//!   grace window a kill. The interrupt is never retried. The same deadline
//!   bounds the reader joins: descendants that outlive the leader and keep
//!   the pipes open are killed with the group.
//! - Both stream readers are joined before `Finished`; then exactly one
//!   completion line is sent and the session's queue handle is dropped. The
//!   readers' handles are gone by then, so the consumer sees the queue close
//!   exactly once.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::future::Future;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::errors::{Result, RunnerError};
use crate::plan::InvocationPlan;
use crate::policy::SanctionedDirs;

use super::scratch::ScratchInput;
use super::signal::{configure_process_group, GroupSignaller, PlatformSignaller};
use super::stream::{pump_lines, PumpStats};
use super::{LogLine, StreamOrigin};

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Completion line for runs that ended before the process started.
const NOT_STARTED: &str = "process finished (failed to start)";

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Time allowed between the interrupt and the kill.
    pub grace: Duration,
    /// Where scratch inputs are written (their temp directory).
    pub sanctioned: SanctionedDirs,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            sanctioned: SanctionedDirs::platform_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Idle,
    Preparing,
    Running,
    Draining,
    Cancelling,
    Finished,
}

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited on its own. `code` is `None` when it was killed by
    /// a signal nobody here sent.
    Exited { code: Option<i32>, success: bool },
    /// The caller cancelled. `escalated` is true when the grace window ran
    /// out and the group had to be killed.
    Cancelled { code: Option<i32>, escalated: bool },
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }

    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Exited { success: true, .. })
    }

    /// Map to the error taxonomy: cancellation and non-zero exits become
    /// errors, success returns the exit code.
    pub fn into_result(self) -> Result<Option<i32>> {
        match self {
            RunOutcome::Exited {
                code,
                success: true,
            } => Ok(code),
            RunOutcome::Exited { code, .. } => Err(RunnerError::ProcessFailed(code)),
            RunOutcome::Cancelled { .. } => Err(RunnerError::Cancelled),
        }
    }

    fn describe(&self) -> String {
        match self {
            RunOutcome::Exited { code: Some(c), .. } => format!("process finished (exit code {c})"),
            RunOutcome::Exited { code: None, .. } => {
                "process finished (terminated by signal)".to_string()
            }
            RunOutcome::Cancelled {
                escalated: false, ..
            } => "process finished (cancelled)".to_string(),
            RunOutcome::Cancelled {
                escalated: true, ..
            } => "process finished (cancelled; killed after grace window)".to_string(),
        }
    }
}

/// Spawns and supervises tool processes.
#[derive(Debug, Clone)]
pub struct Supervisor<S = PlatformSignaller> {
    options: SupervisorOptions,
    signaller: S,
}

impl Supervisor<PlatformSignaller> {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            options,
            signaller: PlatformSignaller::default(),
        }
    }
}

impl<S: GroupSignaller> Supervisor<S> {
    pub fn with_signaller(options: SupervisorOptions, signaller: S) -> Self {
        Self { options, signaller }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Run `plan` to completion.
    ///
    /// - `instruction`: when set, the `--prd` file is replaced by a scratch
    ///   copy starting with this text.
    /// - `queue`: live output consumer; `None` drains and discards output.
    /// - `cancel`: sending `()` requests cancellation. Dropping the sender
    ///   without sending means "never cancel".
    ///
    /// Errors before spawn (scratch, launch) are returned after a diagnostic
    /// and a completion line; every path reaches `Finished`.
    pub async fn run(
        &self,
        plan: InvocationPlan,
        instruction: Option<&str>,
        queue: Option<mpsc::Sender<LogLine>>,
        cancel: oneshot::Receiver<()>,
    ) -> Result<RunOutcome> {
        let mut session = RunSession::new(queue);

        session.advance(SessionState::Preparing);
        let (plan, scratch) = match self.prepare(plan, instruction) {
            Ok(prepared) => prepared,
            Err(e) => {
                session
                    .fail(format!("failed to prepare run: {e}"), self.options.grace)
                    .await;
                return Err(e);
            }
        };

        session.advance(SessionState::Running);
        let running = match spawn(&plan, session.queue.clone()) {
            Ok(running) => running,
            Err(e) => {
                if let Some(scratch) = scratch {
                    scratch.close();
                }
                session
                    .fail(format!("failed to start: {e}"), self.options.grace)
                    .await;
                return Err(e);
            }
        };
        let Running {
            pid,
            mut wait,
            kill_tx,
            stdout,
            stderr,
        } = running;

        let (mut outcome, cancel_deadline) = tokio::select! {
            biased;
            waited = &mut wait => {
                session.advance(SessionState::Draining);
                let outcome = exit_status(waited).map(|status| RunOutcome::Exited {
                    code: status.code(),
                    success: status.success(),
                });
                (outcome, None)
            }
            _ = cancelled(cancel) => {
                session.advance(SessionState::Cancelling);
                let deadline = Instant::now() + self.options.grace;
                let outcome = self
                    .cancel_group(pid, deadline, &mut wait, kill_tx, &session)
                    .await;
                (outcome, Some(deadline))
            }
        };

        let aborts = [stdout.abort_handle(), stderr.abort_handle()];
        let readers = async move {
            join_reader(stdout, StreamOrigin::Stdout).await;
            join_reader(stderr, StreamOrigin::Stderr).await;
        };
        match cancel_deadline {
            None => readers.await,
            Some(deadline) => {
                let group_killed = matches!(
                    outcome,
                    Ok(RunOutcome::Cancelled {
                        escalated: true,
                        ..
                    })
                );
                let killed_now = self
                    .join_readers_after_cancel(
                        pid,
                        readers,
                        aborts,
                        deadline,
                        group_killed,
                        &session,
                    )
                    .await;
                if killed_now {
                    if let Ok(RunOutcome::Cancelled { escalated, .. }) = &mut outcome {
                        *escalated = true;
                    }
                }
            }
        }

        if let Some(scratch) = scratch {
            scratch.close();
        }

        session.finish(outcome.as_ref().ok(), self.options.grace).await;
        outcome
    }

    fn prepare(
        &self,
        plan: InvocationPlan,
        instruction: Option<&str>,
    ) -> Result<(InvocationPlan, Option<ScratchInput>)> {
        let Some(instruction) = instruction else {
            return Ok((plan, None));
        };

        let source = plan.prd_path().ok_or_else(|| {
            RunnerError::Scratch("plan has no --prd argument to prefix".to_string())
        })?;
        let scratch = ScratchInput::create(
            self.options.sanctioned.temp_dir(),
            Path::new(source),
            instruction,
        )?;
        let plan = plan.with_prd_path(scratch.path()).ok_or_else(|| {
            RunnerError::Scratch("plan has no --prd argument to prefix".to_string())
        })?;
        Ok((plan, Some(scratch)))
    }

    async fn cancel_group(
        &self,
        pid: Option<u32>,
        deadline: Instant,
        wait: &mut JoinHandle<io::Result<ExitStatus>>,
        kill_tx: oneshot::Sender<()>,
        session: &RunSession,
    ) -> Result<RunOutcome> {
        let grace = self.options.grace;
        info!(?pid, grace_ms = grace.as_millis() as u64, "cancellation requested; interrupting process group");

        if let Some(pid) = pid {
            if let Err(e) = self.signaller.interrupt(pid) {
                session.diagnostic(format!("failed to interrupt process group {pid}: {e}"));
            }
        }

        if let Ok(waited) = timeout_at(deadline, &mut *wait).await {
            let status = exit_status(waited)?;
            return Ok(RunOutcome::Cancelled {
                code: status.code(),
                escalated: false,
            });
        }

        warn!(?pid, "grace window expired; killing process group");
        if !self.kill_group(pid, session) {
            // Fall back to killing the direct child through its handle.
            let _ = kill_tx.send(());
        }

        let status = exit_status(wait.await)?;
        Ok(RunOutcome::Cancelled {
            code: status.code(),
            escalated: true,
        })
    }

    /// Join the readers after a cancellation. Descendants that survived the
    /// interrupt can hold the pipes open after the leader is gone, so once
    /// `deadline` passes the group is killed (unless `group_killed`) and the
    /// readers get one more grace window before they are aborted.
    ///
    /// Returns true when the group had to be killed here.
    async fn join_readers_after_cancel(
        &self,
        pid: Option<u32>,
        readers: impl Future<Output = ()>,
        aborts: [AbortHandle; 2],
        deadline: Instant,
        group_killed: bool,
        session: &RunSession,
    ) -> bool {
        tokio::pin!(readers);
        if timeout_at(deadline, &mut readers).await.is_ok() {
            return false;
        }

        let killed_now = !group_killed;
        if killed_now {
            warn!(?pid, "output pipes still open after grace window; killing process group");
            self.kill_group(pid, session);
        }

        if timeout(self.options.grace, &mut readers).await.is_err() {
            warn!(?pid, "output pipes still open after kill; abandoning stream readers");
            for abort in aborts {
                abort.abort();
            }
        }
        killed_now
    }

    /// Kill the group led by `pid`. False when there is no pid or the kill
    /// failed (reported as a diagnostic).
    fn kill_group(&self, pid: Option<u32>, session: &RunSession) -> bool {
        let Some(pid) = pid else {
            return false;
        };
        match self.signaller.kill(pid) {
            Ok(()) => true,
            Err(e) => {
                session.diagnostic(format!("failed to kill process group {pid}: {e}"));
                false
            }
        }
    }
}

/// Per-run state. Owns the supervisor's handle on the output queue.
struct RunSession {
    state: SessionState,
    queue: Option<mpsc::Sender<LogLine>>,
}

impl RunSession {
    fn new(queue: Option<mpsc::Sender<LogLine>>) -> Self {
        Self {
            state: SessionState::Idle,
            queue,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(next > self.state, "session state must move forward");
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    fn diagnostic(&self, text: String) {
        warn!("{text}");
        if let Some(queue) = &self.queue {
            let _ = queue.try_send(LogLine::diagnostic(text));
        }
    }

    /// Emit the single completion line, then drop the queue handle.
    async fn finish(self, outcome: Option<&RunOutcome>, send_timeout: Duration) {
        let line = match outcome {
            Some(outcome) => LogLine::supervisor(outcome.describe(), !outcome.success()),
            None => LogLine::supervisor("process finished (status unavailable)", true),
        };
        self.close_with(line, send_timeout).await;
    }

    /// The run ended before the process started.
    async fn fail(self, text: String, send_timeout: Duration) {
        self.diagnostic(text);
        self.close_with(LogLine::supervisor(NOT_STARTED, true), send_timeout)
            .await;
    }

    async fn close_with(mut self, line: LogLine, send_timeout: Duration) {
        self.advance(SessionState::Finished);
        info!(text = %line.text, "session finished");

        if let Some(queue) = self.queue.take() {
            if let Err(e) = queue.send_timeout(line, send_timeout).await {
                warn!(error = %e, "could not deliver completion line");
            }
        }
    }
}

struct Running {
    pid: Option<u32>,
    wait: JoinHandle<io::Result<ExitStatus>>,
    kill_tx: oneshot::Sender<()>,
    stdout: JoinHandle<io::Result<PumpStats>>,
    stderr: JoinHandle<io::Result<PumpStats>>,
}

fn spawn(plan: &InvocationPlan, queue: Option<mpsc::Sender<LogLine>>) -> Result<Running> {
    let program = plan.executable().to_string();
    let launch_error = |source: io::Error| RunnerError::Launch {
        program: program.clone(),
        source,
    };

    let mut cmd = Command::new(plan.executable());
    cmd.args(plan.arguments())
        .env_clear()
        .envs(plan.env_pairs())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    configure_process_group(&mut cmd);

    let mut child = cmd.spawn().map_err(launch_error)?;
    let pid = child.id();
    info!(?pid, program = %program, "tool process started");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| launch_error(io::Error::other("stdout pipe unavailable")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| launch_error(io::Error::other("stderr pipe unavailable")))?;

    let (kill_tx, kill_rx) = oneshot::channel();
    let wait = tokio::spawn(wait_for_exit(child, kill_rx));
    let stdout = tokio::spawn(pump_lines(stdout, StreamOrigin::Stdout, queue.clone()));
    let stderr = tokio::spawn(pump_lines(stderr, StreamOrigin::Stderr, queue));

    Ok(Running {
        pid,
        wait,
        kill_tx,
        stdout,
        stderr,
    })
}

async fn wait_for_exit(mut child: Child, kill_rx: oneshot::Receiver<()>) -> io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill_rx => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "direct kill failed; child may already be gone");
            }
            child.wait().await
        }
    }
}

/// Resolves only on an explicit cancellation request.
async fn cancelled(cancel: oneshot::Receiver<()>) {
    if cancel.await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn exit_status(
    waited: std::result::Result<io::Result<ExitStatus>, tokio::task::JoinError>,
) -> Result<ExitStatus> {
    let status = waited
        .map_err(|e| RunnerError::Other(anyhow::anyhow!("wait task failed: {e}")))??;
    Ok(status)
}

async fn join_reader(handle: JoinHandle<io::Result<PumpStats>>, origin: StreamOrigin) {
    match handle.await {
        Ok(Ok(stats)) => debug!(
            stream = %origin,
            lines = stats.lines,
            delivered = stats.delivered,
            dropped = stats.dropped,
            overflow_episodes = stats.overflow_episodes,
            "stream reader joined"
        ),
        Ok(Err(e)) => warn!(stream = %origin, error = %e, "stream reader failed"),
        Err(e) => warn!(stream = %origin, error = %e, "stream reader task panicked"),
    }
}
