//! Provisioning Errors
//!
//! Every operation returns [`ProvisionError`] on the first failure. Nothing is
//! caught or retried; the CLI turns the error into a non-zero exit status.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while provisioning or tearing down an environment.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The requested version prefix matches nothing the version manager offers.
    #[error("No installable Python version matches '{0}'")]
    VersionResolution(String),

    /// A package or interpreter install step exited non-zero.
    #[error("Install step failed: `{command}`: {detail}")]
    Install { command: String, detail: String },

    /// An artifact could not be fetched.
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// A virtual or named environment could not be created.
    #[error("Failed to create environment at {}: {}", path.display(), detail)]
    EnvironmentCreate { path: PathBuf, detail: String },

    /// A helper command (not an install step) exited non-zero.
    #[error("Command failed: `{command}`: {detail}")]
    Command { command: String, detail: String },

    /// An external program could not be started at all.
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The environment-variable contract holds an unusable value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid config file: {0}")]
    ConfigFile(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProvisionError>;
