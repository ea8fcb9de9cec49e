//! pip Package Installer
//!
//! Installs tooling into whichever interpreter is first on the context's
//! `PATH`, by running `python -m pip`.

use log::info;

use super::ProvisionContext;
use crate::error::Result;
use crate::execution::runner::{install_error, run_checked, CommandRunner, CommandSpec};

pub struct Pip<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Pip<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new("python").args(["-m", "pip"])
    }

    /// Installs `packages` at their latest version.
    ///
    /// With `upgrade`, already installed packages are upgraded as well.
    pub fn install(&self, ctx: &ProvisionContext, packages: &[String], upgrade: bool) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }

        info!("Installing {}", packages.join(" "));

        let mut command = self.command().arg("install");
        if upgrade {
            command = command.arg("--upgrade");
        }
        let command = command.args(packages.iter().cloned());

        run_checked(self.runner, ctx, &command, install_error)?;
        Ok(())
    }
}
