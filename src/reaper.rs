//! Escalating termination: graceful signal, bounded poll, forced kill
//!
//! The reaper owns the back half of an invocation. A clean drain needs only a
//! plain wait; a stalled one walks an explicit state machine
//! (Running → Terminating → Killed) whose every suspension is bounded, so an
//! invocation can never block forever on a hung child. The one exception is
//! the post-kill flush, which may block until end-of-stream because a killed
//! process's pipes close promptly.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::drain::{drain_streams, drain_to_eof};
use crate::error::RunnerError;
use crate::process::ProcessHandle;

/// How often the reaper re-checks process status while waiting out the
/// graceful-termination budget.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where the escalation sequence ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapState {
    /// No signal was sent; the process finished on its own
    Running,
    /// The graceful signal sufficed
    Terminating,
    /// The polling budget ran out and a forced kill was issued
    Killed,
}

/// What the reaper hands back: the reaped status, any output recovered after
/// the initial drain, and how far the escalation went.
pub(crate) struct ReapOutcome {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
    pub(crate) state: ReapState,
}

/// Reap a drained process.
///
/// `completed` is the drain verdict. A completed drain means both pipes hit
/// end-of-stream, so the process is exiting on its own and a plain wait
/// suffices. Otherwise the escalation sequence runs: graceful signal, up to
/// `terminate_timeout` one-second status polls, a second timed drain to catch
/// shutdown output, and a forced kill with a final unconditional flush if the
/// budget ran out.
///
/// Stalls and ignored signals are absorbed here, never surfaced as errors;
/// the only failures that propagate are the OS refusing a signal or a wait.
pub(crate) async fn reap(
    handle: &mut ProcessHandle,
    completed: bool,
    read_timeout: Duration,
    terminate_timeout: u64,
) -> Result<ReapOutcome, RunnerError> {
    if completed {
        let status = handle.wait().await?;
        return Ok(ReapOutcome {
            status,
            stdout: Vec::new(),
            stderr: Vec::new(),
            state: ReapState::Running,
        });
    }

    info!("terminating process");
    handle.terminate()?;
    let mut state = ReapState::Terminating;

    let mut status = poll_until_exit(|| handle.try_status(), terminate_timeout).await?;

    // Flush whatever the process managed to write while shutting down.
    let flush = drain_streams(&mut handle.stdout, &mut handle.stderr, read_timeout).await?;
    let mut stdout = flush.stdout;
    let mut stderr = flush.stderr;

    // The process may have finished dying while the flush ran.
    if status.is_none() {
        status = handle.try_status()?;
    }

    if status.is_none() {
        warn!("process outlived the termination budget, killing it");
        handle.kill()?;
        state = ReapState::Killed;

        let rest = drain_to_eof(&mut handle.stdout, &mut handle.stderr).await?;
        stdout.extend_from_slice(&rest.stdout);
        stderr.extend_from_slice(&rest.stderr);
    } else {
        info!("process terminated");
    }

    let status = match status.take() {
        Some(status) => status,
        None => handle.wait().await?,
    };

    Ok(ReapOutcome {
        status,
        stdout,
        stderr,
        state,
    })
}

/// Poll `probe` until it reports an exit or the budget of `intervals`
/// one-second sleeps is spent. The probe runs once up front and once after
/// each sleep, so a process that dies to the signal immediately costs no
/// sleep at all, and an ignoring one costs exactly `intervals` seconds.
async fn poll_until_exit<T, F>(mut probe: F, intervals: u64) -> Result<Option<T>, RunnerError>
where
    F: FnMut() -> Result<Option<T>, RunnerError>,
{
    let mut status = probe()?;
    let mut waited = 0;
    while status.is_none() && waited < intervals {
        sleep(POLL_INTERVAL).await;
        waited += 1;
        status = probe()?;
    }
    Ok(status)
}
