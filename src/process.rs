//! Process handle and execution output

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout};
use tracing::info;

use crate::command_spec::CommandSpec;
use crate::drain::StreamState;
use crate::error::RunnerError;

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output from the process
    pub stdout: Vec<u8>,
    /// Standard error from the process
    pub stderr: Vec<u8>,
    /// Exit code from the process.
    ///
    /// `None` means the OS reported signal death instead of an exit code,
    /// which is what a forced kill produces. When `timed_out` is set, even a
    /// present code reflects how the process handled the graceful signal
    /// rather than its own logic, so treat it as a sentinel, not a verdict.
    pub exit_code: Option<i32>,
    /// Whether the invocation went through the stall escalation path
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Create a new `ProcessOutput` with the given values.
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>, timed_out: bool) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            timed_out,
        }
    }

    /// Get stdout as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a UTF-8 string, lossy conversion.
    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Check if the process exited successfully (exit code 0, no stall).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Handle to a spawned child process and its captured pipes.
///
/// Exclusively owned by one invocation; no locking is needed anywhere in the
/// pipeline. [`ProcessHandle::close_streams`] closes both pipes eagerly and
/// is idempotent; dropping the handle closes whatever is still open, which
/// covers the error paths.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    child: Child,
    pub(crate) stdout: StreamState<ChildStdout>,
    pub(crate) stderr: StreamState<ChildStderr>,
}

impl ProcessHandle {
    /// Spawn `spec` with stdout and stderr piped and stdin disconnected.
    ///
    /// A spawn refusal is fatal and never retried.
    pub(crate) fn spawn(spec: &CommandSpec) -> Result<Self, RunnerError> {
        let mut cmd = spec.to_tokio_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| RunnerError::LaunchFailed {
            reason: format!("failed to spawn {:?}: {e}", spec.program),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(RunnerError::PipeUnavailable { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(RunnerError::PipeUnavailable { stream: "stderr" })?;

        if let Some(pid) = child.id() {
            info!(pid, program = ?spec.program, "spawned process");
        }

        Ok(Self {
            child,
            stdout: StreamState::new(stdout),
            stderr: StreamState::new(stderr),
        })
    }

    /// Non-blocking exit check; reaps the process when it has exited.
    pub(crate) fn try_status(&mut self) -> Result<Option<ExitStatus>, RunnerError> {
        self.child
            .try_wait()
            .map_err(|e| RunnerError::WaitFailed {
                reason: e.to_string(),
            })
    }

    /// Wait for the process to exit and reap it.
    pub(crate) async fn wait(&mut self) -> Result<ExitStatus, RunnerError> {
        self.child.wait().await.map_err(|e| RunnerError::WaitFailed {
            reason: e.to_string(),
        })
    }

    /// Send the graceful termination signal (SIGTERM). The process may ignore
    /// it.
    #[cfg(unix)]
    pub(crate) fn terminate(&mut self) -> Result<(), RunnerError> {
        self.signal(nix::sys::signal::Signal::SIGTERM, "SIGTERM")
    }

    /// Forcefully kill the process (SIGKILL).
    #[cfg(unix)]
    pub(crate) fn kill(&mut self) -> Result<(), RunnerError> {
        self.signal(nix::sys::signal::Signal::SIGKILL, "SIGKILL")
    }

    #[cfg(unix)]
    fn signal(
        &mut self,
        signal: nix::sys::signal::Signal,
        name: &'static str,
    ) -> Result<(), RunnerError> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            // Already reaped, nothing left to signal.
            return Ok(());
        };
        match kill(Pid::from_raw(pid as i32), signal) {
            // ESRCH means the process is already gone, not that the OS
            // refused the signal.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(RunnerError::SignalRefused {
                signal: name,
                reason: e.to_string(),
            }),
        }
    }

    /// Without unix signals there is no ignorable "please stop" request, so
    /// graceful termination degrades to the forceful kill.
    #[cfg(not(unix))]
    pub(crate) fn terminate(&mut self) -> Result<(), RunnerError> {
        self.kill()
    }

    #[cfg(not(unix))]
    pub(crate) fn kill(&mut self) -> Result<(), RunnerError> {
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // InvalidInput is how tokio reports an already-exited child.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(RunnerError::SignalRefused {
                signal: "kill",
                reason: e.to_string(),
            }),
        }
    }

    /// Close both pipes exactly once. Safe to call again; already-closed
    /// pipes are skipped.
    pub(crate) fn close_streams(&mut self) {
        self.stdout.close();
        self.stderr.close();
    }
}
