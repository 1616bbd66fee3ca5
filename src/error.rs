//! Error types for process execution

use thiserror::Error;

/// Errors surfaced by process execution.
///
/// A stall (no readable output within the read timeout) and a termination
/// timeout (graceful signal ignored) are not errors: both are absorbed by the
/// escalation sequence in [`crate::reaper`]. Only launch failures and OS-level
/// refusals propagate to the caller.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to launch process: {reason}")]
    LaunchFailed { reason: String },

    #[error("Failed to capture {stream} pipe from child process")]
    PipeUnavailable { stream: &'static str },

    #[error("Failed to read {stream}: {reason}")]
    ReadFailed { stream: &'static str, reason: String },

    #[error("OS refused {signal}: {reason}")]
    SignalRefused { signal: &'static str, reason: String },

    #[error("Failed to wait for process: {reason}")]
    WaitFailed { reason: String },

    #[error("Runner configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },
}
