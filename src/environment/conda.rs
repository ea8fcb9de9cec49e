//! Conda Distribution Management
//!
//! Installs a Miniconda distribution into a cache directory and manages the
//! project-local named environment built from it.
//!
//! # Cache Layout
//!
//! The distribution lives at `{root}` (default `$HOME/miniconda`). A present
//! `{root}/bin/conda` means the cache is usable; anything else at `{root}` is
//! treated as a stale partial install and removed, because the installer
//! refuses to run into an existing directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use super::venv::bin_dir;
use super::ProvisionContext;
use crate::error::{ProvisionError, Result};
use crate::execution::download::Downloader;
use crate::execution::runner::{command_error, install_error, run_checked, CommandRunner, CommandSpec};

/// Whether the distribution had to be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionInstall {
    Cached,
    Installed,
}

/// Entry of `conda list --json`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CondaPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Handle on a conda distribution rooted at `root`.
pub struct Conda<'a> {
    runner: &'a dyn CommandRunner,
    root: PathBuf,
}

impl<'a> Conda<'a> {
    pub fn new(runner: &'a dyn CommandRunner, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    /// Installation root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the `conda` executable inside the distribution.
    pub fn binary(&self) -> PathBuf {
        bin_dir(&self.root).join("conda")
    }

    /// True when a previous job left a usable distribution behind.
    pub fn is_cached(&self) -> bool {
        self.binary().is_file()
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(self.binary())
    }

    /// Installs the distribution unless it is cached.
    ///
    /// The installer is downloaded to `installer_path`, made executable and
    /// run in batch mode against the root.
    pub fn ensure_installed(
        &self,
        ctx: &ProvisionContext,
        downloader: &dyn Downloader,
        installer_url: &str,
        installer_path: &Path,
    ) -> Result<DistributionInstall> {
        if self.is_cached() {
            info!("Skip install conda [cached]");
            return Ok(DistributionInstall::Cached);
        }

        if self.root.exists() {
            warn!("Removing stale conda directory {}", self.root.display());
            fs::remove_dir_all(&self.root)?;
        }

        downloader.download(installer_url, installer_path)?;
        make_executable(installer_path)?;

        info!("Installing conda into {}", self.root.display());
        let command = CommandSpec::new(installer_path)
            .args(["-b", "-p"])
            .arg(self.root.to_string_lossy());
        run_checked(self.runner, ctx, &command, install_error)?;

        Ok(DistributionInstall::Installed)
    }

    /// Puts the distribution's `bin` directory first on `PATH`.
    pub fn activate_base(&self, ctx: ProvisionContext) -> ProvisionContext {
        ctx.prepend_path(bin_dir(&self.root))
    }

    /// Updates conda itself to the latest release.
    pub fn update_self(&self, ctx: &ProvisionContext) -> Result<()> {
        info!("Updating conda");
        run_checked(
            self.runner,
            ctx,
            &self.command().args(["update", "--yes", "conda"]),
            install_error,
        )?;
        Ok(())
    }

    /// Creates the environment at `prefix` with `python=<version>` and `packages`.
    pub fn create_env(
        &self,
        ctx: &ProvisionContext,
        prefix: &Path,
        python_version: &str,
        packages: &[String],
    ) -> Result<()> {
        info!(
            "Creating conda environment at {} with python={} {:?}",
            prefix.display(),
            python_version,
            packages
        );

        let command = self
            .command()
            .args(["create", "-p"])
            .arg(prefix.to_string_lossy())
            .arg("--yes")
            .arg(format!("python={}", python_version))
            .args(packages.iter().cloned());

        run_checked(self.runner, ctx, &command, |_, detail| {
            ProvisionError::EnvironmentCreate {
                path: prefix.to_path_buf(),
                detail,
            }
        })?;

        info!("Successfully created environment at {}", prefix.display());
        Ok(())
    }

    /// Lists packages installed in the environment at `prefix`.
    pub fn list_packages(&self, ctx: &ProvisionContext, prefix: &Path) -> Result<Vec<CondaPackage>> {
        let command = self
            .command()
            .args(["list", "-p"])
            .arg(prefix.to_string_lossy())
            .arg("--json");

        let output = run_checked(self.runner, ctx, &command, command_error)?;
        serde_json::from_str(&output.stdout).map_err(|e| ProvisionError::Command {
            command: command.to_string(),
            detail: format!("unreadable package list: {}", e),
        })
    }

    /// Removes every package from the environment at `prefix`, then the
    /// directory itself.
    pub fn remove_env(&self, ctx: &ProvisionContext, prefix: &Path) -> Result<()> {
        info!("Removing conda environment at {}", prefix.display());

        let command = self
            .command()
            .args(["remove", "-p"])
            .arg(prefix.to_string_lossy())
            .args(["--all", "--yes"]);
        run_checked(self.runner, ctx, &command, command_error)?;

        if prefix.exists() {
            fs::remove_dir_all(prefix)?;
            debug!("Deleted {}", prefix.display());
        }
        Ok(())
    }
}

/// Activates the named environment at `prefix`.
pub fn activate(ctx: ProvisionContext, prefix: &Path) -> ProvisionContext {
    debug!("Activating conda environment {}", prefix.display());
    ctx.with_var("CONDA_PREFIX", prefix.to_string_lossy())
        .with_var("CONDA_DEFAULT_ENV", prefix.to_string_lossy())
        .prepend_path(bin_dir(prefix))
}

/// Deactivates the active named environment, if any.
pub fn deactivate(ctx: ProvisionContext) -> ProvisionContext {
    let Some(prefix) = ctx.get("CONDA_PREFIX").map(PathBuf::from) else {
        return ctx;
    };

    debug!("Deactivating conda environment {}", prefix.display());
    ctx.remove_path_entry(bin_dir(&prefix))
        .without_var("CONDA_PREFIX")
        .without_var("CONDA_DEFAULT_ENV")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
