//! Settings Loading
//!
//! Reads the job's environment-variable contract into [`Settings`] and the
//! optional YAML overrides into [`ProvisionConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::model::{Distribution, Platform, ProvisionConfig, Settings};
use crate::environment::ProvisionContext;
use crate::error::{ProvisionError, Result};

/// Host platform indicator.
pub const PLATFORM_VAR: &str = "TRAVIS_OS_NAME";
/// Build workspace root.
pub const BUILD_DIR_VAR: &str = "TRAVIS_BUILD_DIR";
/// Requested Python version or prefix.
pub const PYTHON_VERSION_VAR: &str = "PYTHON_VERSION";
/// Distribution strategy indicator.
pub const DISTRIBUTION_VAR: &str = "DISTRIB";
/// Coverage tooling indicator.
pub const COVERAGE_VAR: &str = "COVERAGE";

/// Config file picked up from the build directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "ciprovision.yaml";

/// Parses the environment-variable contract.
///
/// `fallback_dir` is used as the build directory when `TRAVIS_BUILD_DIR`
/// is unset.
pub fn settings_from_context(ctx: &ProvisionContext, fallback_dir: &Path) -> Result<Settings> {
    let platform: Platform = ctx.get(PLATFORM_VAR).unwrap_or_default().parse()?;
    let distribution: Distribution = ctx.get(DISTRIBUTION_VAR).unwrap_or_default().parse()?;

    let build_dir = ctx
        .get(BUILD_DIR_VAR)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback_dir.to_path_buf());

    let home_dir = ctx
        .get("HOME")
        .or_else(|| ctx.get("USERPROFILE"))
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);

    let settings = Settings {
        platform,
        distribution,
        python_version: ctx.get(PYTHON_VERSION_VAR).map(str::to_string),
        coverage: ctx.get(COVERAGE_VAR) == Some("true"),
        build_dir,
        home_dir,
    };

    debug!("Settings: {:?}", settings);
    Ok(settings)
}

/// Loads YAML overrides from `path`.
pub fn load_config(path: &Path) -> Result<ProvisionConfig> {
    info!("Loading config from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|e| {
        ProvisionError::Config(format!(
            "failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parses YAML overrides. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<ProvisionConfig> {
    if content.trim().is_empty() {
        return Ok(ProvisionConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Loads the explicit config file, else `ciprovision.yaml` in the build
/// directory, else the defaults.
pub fn resolve_config(explicit: Option<&Path>, build_dir: &Path) -> Result<ProvisionConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let candidate = build_dir.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        return load_config(&candidate);
    }

    debug!("No config file found, using defaults");
    Ok(ProvisionConfig::default())
}
