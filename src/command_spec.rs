//! Command specification for argv-style process execution

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use tokio::process::Command as TokioCommand;

use crate::error::RunnerError;

/// Specification for a command to execute.
///
/// Arguments are stored as discrete `OsString` elements and handed to the OS
/// argv-style; no shell string evaluation happens anywhere in this crate.
///
/// # Example
///
/// ```rust
/// use piperun::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("tar")
///     .arg("-czf")
///     .arg("out.tar.gz")
///     .cwd("/var/backups");
///
/// assert_eq!(cmd.program, OsString::from("tar"));
/// assert_eq!(cmd.args.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings)
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Optional environment overrides
    pub env: Option<HashMap<OsString, OsString>>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` with the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
        }
    }

    /// Parse a whitespace-separated command line.
    ///
    /// The first token is the executable, the rest are its arguments.
    /// Splitting is plain whitespace splitting: quoting is deliberately NOT
    /// interpreted, so an argument containing a space cannot be expressed
    /// through this constructor. Callers that need one build the
    /// `CommandSpec` with [`CommandSpec::new`] and [`CommandSpec::arg`]
    /// instead.
    pub fn parse(command_line: &str) -> Result<Self, RunnerError> {
        let mut tokens = command_line.split_whitespace();
        let program = tokens
            .next()
            .ok_or_else(|| RunnerError::ConfigurationInvalid {
                reason: "command line is empty".to_string(),
            })?;
        Ok(Self::new(program).args(tokens))
    }

    /// Add a single argument to the command.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments to the command.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the command.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set an environment variable for the command.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set multiple environment variables for the command.
    #[must_use]
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let env_map = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in envs {
            env_map.insert(key.into(), value.into());
        }
        self
    }

    /// Convert this `CommandSpec` into a `tokio::process::Command`.
    ///
    /// The resulting command uses argv-style argument passing, so no shell
    /// interpretation is possible.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        cmd
    }
}
