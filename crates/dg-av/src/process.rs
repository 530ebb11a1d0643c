//! Process Registry & Executor.
//!
//! Every external tool invocation is spawned through a [`ProcessRegistry`],
//! which keys the live child by its [`ProcessId`] so it can be cancelled
//! from anywhere holding a registry clone. An entry is inserted before
//! [`ProcessRegistry::spawn`] returns and removed when the process reaches a
//! terminal state or is cancelled, whichever happens first.
//!
//! Cancellation records a [`KillReason`] on the entry before signalling, so
//! the exit handler can tell a user cancel from a timeout from an external
//! signal.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use dg_core::{Error, KillReason, ProcessId, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

use crate::command::{ToolCommand, ToolOutput};
use crate::tools::ToolKind;

/// Default time between SIGTERM and a hard kill.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(1500);

/// Receives stderr text as the tool produces it.
pub type StderrSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle of one invocation. Terminal states are only observed in logs;
/// the entry is gone from the registry by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Spawned,
    Running,
    Succeeded,
    Failed,
    Killed,
}

/// Cancellation handle shared between the registry entry and the waiter.
#[derive(Default)]
struct Control {
    token: CancellationToken,
    reason: Mutex<Option<KillReason>>,
}

impl Control {
    fn cancel(&self, reason: KillReason) {
        self.reason.lock().get_or_insert(reason);
        self.token.cancel();
    }

    fn reason(&self) -> Option<KillReason> {
        *self.reason.lock()
    }
}

struct Entry {
    serial: u64,
    kind: ToolKind,
    pid: Option<u32>,
    state: ProcessState,
    started: Instant,
    control: Arc<Control>,
}

struct Inner {
    entries: DashMap<ProcessId, Entry>,
    next_serial: AtomicU64,
    kill_grace: Duration,
}

/// Registry of live external processes. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ProcessRegistry {
    inner: Arc<Inner>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_KILL_GRACE)
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("live", &self.inner.entries.len())
            .field("kill_grace", &self.inner.kill_grace)
            .finish()
    }
}

impl ProcessRegistry {
    pub fn new(kill_grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                next_serial: AtomicU64::new(0),
                kill_grace,
            }),
        }
    }

    /// Spawn `cmd` and register it under `id`.
    ///
    /// The entry exists by the time this returns, so a cancel issued right
    /// after cannot miss the process. An id that is still live is rejected.
    pub fn spawn(
        &self,
        cmd: &ToolCommand,
        id: ProcessId,
        on_stderr: Option<StderrSink>,
    ) -> Result<RunningProcess> {
        let tool = cmd.display_name();
        if self.inner.entries.contains_key(&id) {
            return Err(Error::validation(format!("process id {id} is already running")));
        }

        let mut child = cmd
            .to_command()
            .spawn()
            .map_err(|e| Error::tool(&tool, format!("failed to spawn: {e}")))?;

        let pid = child.id();
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let control = Arc::new(Control::default());
        let started = Instant::now();

        match self.inner.entries.entry(id.clone()) {
            MapEntry::Occupied(_) => {
                let _ = child.start_kill();
                return Err(Error::validation(format!("process id {id} is already running")));
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    serial,
                    kind: cmd.kind(),
                    pid,
                    state: ProcessState::Spawned,
                    started,
                    control: Arc::clone(&control),
                });
            }
        }

        tracing::debug!(
            process_id = %id,
            tool = %tool,
            pid = ?pid,
            argv = ?cmd.argv(),
            "Spawned process"
        );

        Ok(RunningProcess {
            registration: Registration {
                registry: self.clone(),
                id,
                serial,
            },
            tool,
            child,
            control,
            on_stderr,
            kill_grace: self.inner.kill_grace,
            started,
            group: GroupGuard { pid, armed: true },
        })
    }

    /// Spawn and wait in one step.
    pub async fn run(
        &self,
        cmd: &ToolCommand,
        id: ProcessId,
        on_stderr: Option<StderrSink>,
    ) -> Result<ToolOutput> {
        self.spawn(cmd, id, on_stderr)?.wait().await
    }

    /// Terminate the process registered under `id`.
    ///
    /// Removes the entry immediately and sends the termination signal; the
    /// waiter observes the exit and reports [`Error::Killed`] with `reason`.
    /// Unknown or already-exited ids are a no-op. Returns whether a process
    /// was found.
    pub fn cancel(&self, id: &ProcessId, reason: KillReason) -> bool {
        let Some((_, entry)) = self.inner.entries.remove(id) else {
            tracing::debug!(process_id = %id, "Cancel requested for unknown process");
            return false;
        };

        tracing::info!(
            process_id = %id,
            tool = %entry.kind,
            reason = %reason,
            elapsed_ms = entry.started.elapsed().as_millis() as u64,
            "Cancelling process"
        );
        entry.control.cancel(reason);
        #[cfg(unix)]
        signal_group(entry.pid, nix::sys::signal::Signal::SIGTERM);
        true
    }

    /// Cancel every registered process. Returns how many were signalled.
    pub fn cancel_all(&self, reason: KillReason) -> usize {
        self.ids()
            .iter()
            .filter(|id| self.cancel(id, reason))
            .count()
    }

    /// Current state of a registered process.
    pub fn state(&self, id: &ProcessId) -> Option<ProcessState> {
        self.inner.entries.get(id).map(|e| e.state)
    }

    pub fn contains(&self, id: &ProcessId) -> bool {
        self.inner.entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ProcessId> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

/// Removes the registry entry when dropped, unless a newer process has
/// since been registered under the same id.
struct Registration {
    registry: ProcessRegistry,
    id: ProcessId,
    serial: u64,
}

impl Registration {
    fn set_state(&self, state: ProcessState) {
        if let Some(mut entry) = self.registry.inner.entries.get_mut(&self.id) {
            if entry.serial == self.serial {
                entry.state = state;
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let serial = self.serial;
        self.registry
            .inner
            .entries
            .remove_if(&self.id, |_, e| e.serial == serial);
    }
}

/// Hard-kills the process group when dropped while still armed.
///
/// A waiter that is dropped mid-wait never reaches the grace escalation, so
/// this is what stops helpers a tool forked from outliving it.
struct GroupGuard {
    pid: Option<u32>,
    armed: bool,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(pid = ?self.pid, "Waiter abandoned; killing process group");
        #[cfg(unix)]
        signal_group(self.pid, nix::sys::signal::Signal::SIGKILL);
    }
}

/// A spawned, registered process. Dropping it without waiting, or dropping
/// the `wait` future before it completes, kills the whole process group and
/// unregisters it.
pub struct RunningProcess {
    registration: Registration,
    tool: String,
    child: Child,
    control: Arc<Control>,
    on_stderr: Option<StderrSink>,
    kill_grace: Duration,
    started: Instant,
    group: GroupGuard,
}

impl RunningProcess {
    pub fn id(&self) -> &ProcessId {
        &self.registration.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit, collecting stdout and streaming stderr.
    ///
    /// - exit code 0: `Ok` with the captured output
    /// - non-zero exit code: [`Error::Tool`] carrying the stderr text
    /// - terminated by a signal, or cancelled: [`Error::Killed`]
    pub async fn wait(self) -> Result<ToolOutput> {
        let RunningProcess {
            registration,
            tool,
            mut child,
            control,
            on_stderr,
            kill_grace,
            started,
            mut group,
        } = self;
        registration.set_state(ProcessState::Running);
        let pid = group.pid;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let exit = async {
            let natural = tokio::select! {
                status = child.wait() => Some(status),
                _ = control.token.cancelled() => None,
            };
            match natural {
                Some(status) => status,
                None => {
                    let status = terminate_after_grace(&mut child, pid, kill_grace).await;
                    // Helpers that survived their leader.
                    #[cfg(unix)]
                    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
                    status
                }
            }
        };

        let (status, stdout, stderr) = tokio::join!(
            exit,
            read_to_end(stdout),
            pump_stderr(stderr, on_stderr.as_deref())
        );
        group.disarm();

        let status = status.map_err(|e| Error::tool(&tool, format!("I/O error waiting for process: {e}")))?;
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();
        let reason = control.reason();

        let (state, result) = classify(&tool, status, reason, stdout, stderr);
        registration.set_state(state);
        tracing::debug!(
            process_id = %registration.id,
            tool = %tool,
            state = ?state,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Process exited"
        );
        result
    }
}

fn classify(
    tool: &str,
    status: ExitStatus,
    reason: Option<KillReason>,
    stdout: String,
    stderr: String,
) -> (ProcessState, Result<ToolOutput>) {
    match (status.code(), reason) {
        (Some(0), _) => (
            ProcessState::Succeeded,
            Ok(ToolOutput {
                status,
                stdout,
                stderr,
            }),
        ),
        // A cancelled tool that traps the signal still exits with a code.
        (Some(_), Some(reason)) => (
            ProcessState::Killed,
            Err(Error::Killed {
                tool: tool.to_string(),
                reason,
            }),
        ),
        (Some(code), None) => (
            ProcessState::Failed,
            Err(Error::tool(
                tool,
                format!("exited with status {code}: {}", stderr.trim()),
            )),
        ),
        (None, reason) => (
            ProcessState::Killed,
            Err(Error::Killed {
                tool: tool.to_string(),
                reason: reason.unwrap_or(KillReason::External),
            }),
        ),
    }
}

/// Give a signalled child `grace` to exit, then kill it outright.
async fn terminate_after_grace(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
) -> std::io::Result<ExitStatus> {
    #[cfg(not(unix))]
    let _ = child.start_kill();

    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status;
    }

    tracing::warn!(pid = ?pid, "Process ignored termination signal; killing");
    #[cfg(unix)]
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
    let _ = child.start_kill();
    child.wait().await
}

/// Signal the process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: nix::sys::signal::Signal) {
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = nix::sys::signal::killpg(Pid::from_raw(pid), signal) {
        tracing::debug!(pid, ?signal, "Signal not delivered: {e}");
    }
}

async fn read_to_end<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            tracing::debug!("Failed reading process output: {e}");
        }
    }
    buf
}

async fn pump_stderr<R: AsyncRead + Unpin>(
    reader: Option<R>,
    sink: Option<&(dyn Fn(&str) + Send + Sync)>,
) -> Vec<u8> {
    let mut acc = Vec::new();
    let Some(mut reader) = reader else {
        return acc;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if let Some(sink) = sink {
                    sink(&String::from_utf8_lossy(&chunk[..n]));
                }
                acc.extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                tracing::debug!("Failed reading process stderr: {e}");
                break;
            }
        }
    }
    acc
}
