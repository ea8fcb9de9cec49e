//! Environment Management Module
//!
//! The explicit environment context plus adapters for the external tools
//! that build Python environments: pyenv, venv, conda and pip.

pub mod conda;
pub mod context;
pub mod manager;
pub mod pip;
pub mod pyenv;
pub mod venv;

pub use conda::{Conda, DistributionInstall};
pub use context::{EnvChange, ProvisionContext};
pub use manager::{InstallOutcome, PackageManager};
pub use pip::Pip;
pub use pyenv::Pyenv;
