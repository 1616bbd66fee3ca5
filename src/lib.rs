//! Child process execution with output draining and escalating termination
//!
//! Spawns a command with stdout and stderr piped, drains both pipes from a
//! single task using multiplexed readiness waits, and declares a stall when
//! neither pipe produces data within the read timeout. A stalled process is
//! walked through an escalating shutdown — graceful signal, a bounded budget
//! of one-second status polls, then a forced kill — with the pipes flushed at
//! each step so shutdown output is not lost. The caller always gets back the
//! exit code and everything both streams wrote.
//!
//! Commands run argv-style through [`CommandSpec`]; the string entry point
//! [`run_process`] splits its command line on whitespace, a deliberate
//! simplification that cannot express arguments containing spaces.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), piperun::RunnerError> {
//! let output = piperun::run_process("echo hello", Duration::from_secs(5), 3).await?;
//! assert_eq!(output.stdout_string(), "hello\n");
//! assert_eq!(output.exit_code, Some(0));
//! # Ok(())
//! # }
//! ```

pub mod command_spec;
pub mod drain;
pub mod error;
pub mod process;
pub mod reaper;
pub mod runner;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use process::ProcessOutput;
pub use reaper::ReapState;
pub use runner::{Runner, RunnerConfig, run_process};
