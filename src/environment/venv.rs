//! Virtual Environments
//!
//! Creates a `venv` on top of the selected interpreter and toggles its
//! activation in a [`ProvisionContext`].

use std::path::{Path, PathBuf};

use log::{debug, info};

use super::ProvisionContext;
use crate::error::{ProvisionError, Result};
use crate::execution::runner::{run_checked, CommandRunner, CommandSpec};

/// Variable naming the active virtual environment.
pub const VIRTUAL_ENV_VAR: &str = "VIRTUAL_ENV";

/// Directory holding an environment's executables.
pub fn bin_dir(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts")
    } else {
        env_dir.join("bin")
    }
}

/// Runs `python -m venv <dir>` with whatever `python` the context resolves.
pub fn create(runner: &dyn CommandRunner, ctx: &ProvisionContext, dir: &Path) -> Result<()> {
    info!("Creating virtual environment at {}", dir.display());

    let command = CommandSpec::new("python").args(["-m", "venv"]).arg(dir.to_string_lossy());
    run_checked(runner, ctx, &command, |_, detail| ProvisionError::EnvironmentCreate {
        path: dir.to_path_buf(),
        detail,
    })?;
    Ok(())
}

/// Activates the environment at `dir`.
pub fn activate(ctx: ProvisionContext, dir: &Path) -> ProvisionContext {
    debug!("Activating virtual environment {}", dir.display());
    ctx.with_var(VIRTUAL_ENV_VAR, dir.to_string_lossy())
        .without_var("PYTHONHOME")
        .prepend_path(bin_dir(dir))
}

/// Deactivates the active virtual environment, if any.
pub fn deactivate(ctx: ProvisionContext) -> ProvisionContext {
    let Some(active) = ctx.get(VIRTUAL_ENV_VAR).map(PathBuf::from) else {
        return ctx;
    };

    debug!("Deactivating virtual environment {}", active.display());
    ctx.remove_path_entry(bin_dir(&active))
        .without_var(VIRTUAL_ENV_VAR)
}
