//! External Command Invocation
//!
//! Every program the provisioner launches goes through [`CommandRunner`].
//! The system implementation starts the child with exactly the variables of
//! the [`ProvisionContext`], so `PATH` edits made by earlier steps decide
//! which `python` or `conda` is found.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use log::{debug, error};

use crate::environment::ProvisionContext;
use crate::error::{ProvisionError, Result};

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program file name followed by the arguments, e.g. `conda update --yes conda`.
    pub fn short_line(&self) -> String {
        let name = self
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string());

        std::iter::once(name)
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short description of a failure for error messages.
    pub fn failure_detail(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr.lines().last().unwrap_or(stderr))
        }
    }
}

/// Capability to run external programs.
pub trait CommandRunner {
    /// Runs `command` with the environment of `ctx` and waits for it.
    ///
    /// Only a failure to start the program is an error; a non-zero exit is
    /// reported through [`CommandOutput::code`].
    fn run(&self, ctx: &ProvisionContext, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, ctx: &ProvisionContext, command: &CommandSpec) -> Result<CommandOutput> {
        debug!("+ {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).env_clear().envs(ctx.vars());

        let output = cmd.output().map_err(|source| ProvisionError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.stdout.trim().is_empty() {
            debug!("stdout:\n{}", result.stdout.trim_end());
        }

        Ok(result)
    }
}

/// Runs `command` and maps a non-zero exit through `on_failure`.
///
/// The failing command and its stderr are logged before the error is returned.
pub fn run_checked<F>(
    runner: &dyn CommandRunner,
    ctx: &ProvisionContext,
    command: &CommandSpec,
    on_failure: F,
) -> Result<CommandOutput>
where
    F: FnOnce(String, String) -> ProvisionError,
{
    let output = runner.run(ctx, command)?;

    if output.success() {
        return Ok(output);
    }

    error!(
        "Command failed with exit code {:?}: {}",
        output.code, command
    );
    if !output.stderr.trim().is_empty() {
        error!("stderr:\n{}", output.stderr.trim_end());
    }

    Err(on_failure(command.to_string(), output.failure_detail()))
}

/// Maps a failure to [`ProvisionError::Command`].
pub fn command_error(command: String, detail: String) -> ProvisionError {
    ProvisionError::Command { command, detail }
}

/// Maps a failure to [`ProvisionError::Install`].
pub fn install_error(command: String, detail: String) -> ProvisionError {
    ProvisionError::Install { command, detail }
}
