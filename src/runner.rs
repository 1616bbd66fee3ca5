//! Per-invocation execution pipeline: launch, drain, reap, assemble

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command_spec::CommandSpec;
use crate::drain::drain_streams;
use crate::error::RunnerError;
use crate::process::{ProcessHandle, ProcessOutput};
use crate::reaper::{ReapState, reap};

/// Timeouts governing one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// How long a readiness wait across the output pipes may go without any
    /// stream becoming readable before the invocation counts as stalled.
    /// Reused for the post-termination flush.
    pub read_timeout: Duration,
    /// How many one-second status polls the reaper grants after the graceful
    /// signal before escalating to a kill.
    pub terminate_timeout: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            terminate_timeout: 5,
        }
    }
}

/// Runs one command at a time to completion, buffering everything it writes.
///
/// Each invocation owns its process handle exclusively: a single logical flow
/// of control drains both pipes via multiplexed readiness waits, with no
/// worker tasks and no shared state. Callers wanting parallel invocations run
/// independent ones.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    /// Timeouts applied to every invocation
    pub config: RunnerConfig,
}

impl Runner {
    /// Create a new `Runner` with the given timeouts.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run `spec` to completion and return its exit code and captured output.
    ///
    /// The pipeline is strictly sequential: spawn, drain both pipes until
    /// end-of-stream or a stall, then reap — escalating through terminate and
    /// kill when the drain stalled. The returned buffers are the
    /// concatenation, in call order, of every partial drain's contribution.
    /// Both pipes are closed before this returns, whichever path was taken.
    pub async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, RunnerError> {
        info!(program = ?spec.program, "starting process");
        let mut handle = ProcessHandle::spawn(spec)?;

        info!("waiting for process output");
        let first =
            drain_streams(&mut handle.stdout, &mut handle.stderr, self.config.read_timeout).await?;

        let mut stdout = first.stdout;
        let mut stderr = first.stderr;

        let outcome = reap(
            &mut handle,
            first.completed,
            self.config.read_timeout,
            self.config.terminate_timeout,
        )
        .await?;
        stdout.extend_from_slice(&outcome.stdout);
        stderr.extend_from_slice(&outcome.stderr);

        handle.close_streams();

        let exit_code = outcome.status.code();
        let timed_out = outcome.state != ReapState::Running;
        info!(?exit_code, timed_out, "process finished");

        Ok(ProcessOutput::new(stdout, stderr, exit_code, timed_out))
    }

    /// Run a whitespace-separated command line. See [`CommandSpec::parse`]
    /// for the splitting rules and their limits.
    pub async fn run_command_line(&self, command: &str) -> Result<ProcessOutput, RunnerError> {
        self.run(&CommandSpec::parse(command)?).await
    }
}

/// Run a command line with explicit timeouts.
///
/// `read_timeout` bounds every readiness wait on the output pipes;
/// `terminate_timeout` is the number of one-second status polls granted after
/// the graceful signal before the process is killed. The call returns within
/// roughly `read_timeout + terminate_timeout` seconds plus one bounded flush
/// even for a child that hangs forever.
pub async fn run_process(
    command: &str,
    read_timeout: Duration,
    terminate_timeout: u64,
) -> Result<ProcessOutput, RunnerError> {
    Runner::new(RunnerConfig {
        read_timeout,
        terminate_timeout,
    })
    .run_command_line(command)
    .await
}
