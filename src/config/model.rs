//! Provisioning Settings Model
//!
//! Typed view of the environment-variable contract plus the optional YAML
//! overrides.
//!
//! # Example YAML Format
//!
//! ```yaml
//! venv_dir: .venv
//! conda:
//!   root: /home/travis/miniconda
//!   env_packages: [pip, virtualenv]
//! tooling:
//!   base: [sphinx, tox]
//!   coverage: [pytest-cov, coverage, flake8]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Installer fetched when no cached distribution manager is present.
pub const DEFAULT_INSTALLER_URL: &str =
    "https://repo.continuum.io/miniconda/Miniconda3-latest-Linux-x86_64.sh";

/// Host operating system family (`TRAVIS_OS_NAME`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Osx,
    Linux,
    Windows,
}

impl FromStr for Platform {
    type Err = ProvisionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" | "linux" => Ok(Platform::Linux),
            "osx" => Ok(Platform::Osx),
            "windows" => Ok(Platform::Windows),
            other => Err(ProvisionError::Config(format!(
                "unrecognized platform '{}' (expected osx, linux or windows)",
                other
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Osx => write!(f, "osx"),
            Platform::Linux => write!(f, "linux"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}

/// Python provisioning strategy (`DISTRIB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Use whatever interpreter the job already has.
    Default,
    /// Install and use an isolated conda distribution.
    Conda,
}

impl FromStr for Distribution {
    type Err = ProvisionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "conda" => Ok(Distribution::Conda),
            "" | "default" | "system" | "ubuntu" => Ok(Distribution::Default),
            other => Err(ProvisionError::Config(format!(
                "unrecognized distribution '{}' (expected conda or default)",
                other
            ))),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Default => write!(f, "default"),
            Distribution::Conda => write!(f, "conda"),
        }
    }
}

/// Values read once from the job environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub platform: Platform,
    pub distribution: Distribution,
    /// Requested version or version prefix (`PYTHON_VERSION`)
    pub python_version: Option<String>,
    /// Install coverage and lint tooling (`COVERAGE=true`)
    pub coverage: bool,
    /// Root of the build workspace (`TRAVIS_BUILD_DIR`)
    pub build_dir: PathBuf,
    /// Home directory (`HOME`), parent of the default conda cache
    pub home_dir: Option<PathBuf>,
}

impl Settings {
    /// Returns the version spec, failing when the job did not provide one.
    pub fn require_python_version(&self) -> Result<&str, ProvisionError> {
        self.python_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(str::trim)
            .ok_or_else(|| ProvisionError::Config("PYTHON_VERSION must be set".to_string()))
    }
}

/// Optional overrides loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Environment directory, relative to the build directory
    pub venv_dir: PathBuf,
    pub conda: CondaConfig,
    pub tooling: ToolingConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            venv_dir: PathBuf::from(".venv"),
            conda: CondaConfig::default(),
            tooling: ToolingConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Absolute path of the project-local environment.
    pub fn venv_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(&self.venv_dir)
    }

    /// Conda installation root, defaulting to `$HOME/miniconda`.
    ///
    /// The home directory is only needed when no root is configured.
    pub fn conda_root(&self, home_dir: Option<&Path>) -> Result<PathBuf, ProvisionError> {
        if let Some(root) = &self.conda.root {
            return Ok(root.clone());
        }
        home_dir
            .map(|home| home.join("miniconda"))
            .ok_or_else(|| ProvisionError::Config("HOME must be set to locate conda".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondaConfig {
    pub root: Option<PathBuf>,
    pub installer_url: String,
    /// Packages created alongside the interpreter in the named environment
    pub env_packages: Vec<String>,
}

impl Default for CondaConfig {
    fn default() -> Self {
        Self {
            root: None,
            installer_url: DEFAULT_INSTALLER_URL.to_string(),
            env_packages: vec!["pip".to_string(), "virtualenv".to_string()],
        }
    }
}

/// Package lists installed by the tooling phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolingConfig {
    /// Upgraded to latest before anything else
    pub upgrade: Vec<String>,
    /// Documentation generator and test orchestrator
    pub base: Vec<String>,
    /// Installed only when coverage is on
    pub coverage: Vec<String>,
}

impl Default for ToolingConfig {
    fn default() -> Self {
        Self {
            upgrade: to_strings(&["pip", "setuptools"]),
            base: to_strings(&["sphinx", "tox"]),
            coverage: to_strings(&[
                "pytest-cov",
                "pytest-virtualenv",
                "coverage",
                "coveralls",
                "flake8",
                "pre-commit",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
