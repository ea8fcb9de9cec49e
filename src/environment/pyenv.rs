//! pyenv Version Manager
//!
//! Resolves, installs and selects interpreter versions through `pyenv`.
//! Build scratch space is kept under the build directory so CI caches can
//! pick it up between jobs.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::manager::{resolve_prefix, InstallOutcome, PackageManager};
use super::ProvisionContext;
use crate::error::{ProvisionError, Result};
use crate::execution::runner::{command_error, install_error, run_checked, CommandRunner, CommandSpec};

/// Executable name looked up on `PATH`.
pub const PYENV_BIN: &str = "pyenv";

/// Directories python-build uses during an install, relative to the build dir.
/// Each pair is (directory, variable exported for python-build).
const BUILD_DIRS: &[(&str, &str)] = &[
    (".pyenv/log", "PYTHON_BUILD_BUILD_PATH"),
    (".pyenv/tmp", "TMPDIR"),
    (".pyenv/cache", "PYTHON_BUILD_CACHE_PATH"),
];

/// Creates the python-build log, temp and cache directories and exports them.
///
/// Existing directories are reused.
pub fn prepare_build_dirs(ctx: ProvisionContext, build_dir: &Path) -> Result<ProvisionContext> {
    let mut ctx = ctx;
    for (relative, var) in BUILD_DIRS {
        let dir = build_dir.join(relative);
        fs::create_dir_all(&dir)?;
        debug!("{}={}", var, dir.display());
        ctx = ctx.with_var(*var, dir.to_string_lossy());
    }
    Ok(ctx)
}

/// Handle on the `pyenv` executable.
pub struct Pyenv<'a> {
    runner: &'a dyn CommandRunner,
    binary: PathBuf,
}

impl<'a> Pyenv<'a> {
    /// Uses an explicit `pyenv` binary.
    pub fn new(runner: &'a dyn CommandRunner, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    /// Looks `pyenv` up on the context's `PATH`.
    ///
    /// Returns `None` when it is not installed.
    pub fn locate(runner: &'a dyn CommandRunner, ctx: &ProvisionContext) -> Option<Self> {
        ctx.find_executable(PYENV_BIN).map(|binary| {
            debug!("Found pyenv at {}", binary.display());
            Self::new(runner, binary)
        })
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.binary)
    }

    /// Installs the shell hooks: `PYENV_ROOT`, `PYENV_SHELL` and the shims
    /// directory at the front of `PATH`.
    pub fn init_shell(&self, ctx: ProvisionContext) -> Result<ProvisionContext> {
        let output = run_checked(self.runner, &ctx, &self.command().arg("root"), command_error)?;

        let root = PathBuf::from(output.stdout.trim());
        if root.as_os_str().is_empty() {
            return Err(ProvisionError::Command {
                command: format!("{} root", self.binary.display()),
                detail: "printed no root directory".to_string(),
            });
        }

        info!("Initializing pyenv shell hooks (root: {})", root.display());

        Ok(ctx
            .with_var("PYENV_ROOT", root.to_string_lossy())
            .with_var("PYENV_SHELL", "bash")
            .prepend_path(root.join("shims")))
    }

    /// Versions pyenv knows how to build.
    pub fn available_versions(&self, ctx: &ProvisionContext) -> Result<Vec<String>> {
        let output = run_checked(
            self.runner,
            ctx,
            &self.command().args(["install", "--list"]),
            command_error,
        )?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.ends_with(':'))
            .map(str::to_string)
            .collect())
    }

    /// Makes `version` the global default.
    pub fn set_global(&self, ctx: &ProvisionContext, version: &str) -> Result<()> {
        info!("Selecting Python {} as global version", version);
        run_checked(
            self.runner,
            ctx,
            &self.command().args(["global", version]),
            command_error,
        )?;
        Ok(())
    }

    /// Regenerates the shims.
    pub fn rehash(&self, ctx: &ProvisionContext) -> Result<()> {
        run_checked(self.runner, ctx, &self.command().arg("rehash"), command_error)?;
        Ok(())
    }
}

impl PackageManager for Pyenv<'_> {
    fn name(&self) -> &str {
        PYENV_BIN
    }

    fn resolve_version(&self, ctx: &ProvisionContext, spec: &str) -> Result<String> {
        let available = self.available_versions(ctx)?;
        debug!("pyenv offers {} versions", available.len());

        let resolved = resolve_prefix(&available, spec)
            .ok_or_else(|| ProvisionError::VersionResolution(spec.to_string()))?;

        info!("Resolved Python '{}' to {}", spec, resolved);
        Ok(resolved)
    }

    fn install(&self, ctx: &ProvisionContext, version: &str) -> Result<InstallOutcome> {
        if self.list_installed(ctx)?.iter().any(|v| v == version) {
            info!("Python {} already installed, skip existing", version);
            return Ok(InstallOutcome::AlreadyPresent);
        }

        info!("Installing Python {} with pyenv", version);
        run_checked(
            self.runner,
            ctx,
            &self.command().args(["install", "--skip-existing", version]),
            install_error,
        )?;
        Ok(InstallOutcome::Installed)
    }

    fn list_installed(&self, ctx: &ProvisionContext) -> Result<Vec<String>> {
        let output = run_checked(
            self.runner,
            ctx,
            &self.command().args(["versions", "--bare"]),
            command_error,
        )?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
