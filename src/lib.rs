//! ciprovision - Python Environment Provisioning for CI Jobs
//!
//! Reads a small environment-variable contract describing the build host and
//! the desired Python distribution, produces an activated Python environment
//! with a fixed tool set, and tears the isolated distribution down again at
//! the end of the job.
//!
//! # Architecture
//!
//! The library is organized into five modules:
//!
//! - [`config`]: Environment contract and YAML overrides
//! - [`environment`]: Provisioning context and pyenv/venv/conda/pip adapters
//! - [`execution`]: Command runner, downloader and the provisioner itself
//! - [`monitoring`]: Phase timeline
//! - [`error`]: Error taxonomy
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use ciprovision::config::{resolve_config, settings_from_context};
//! use ciprovision::environment::ProvisionContext;
//! use ciprovision::execution::{HttpDownloader, Provisioner, SystemRunner};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ProvisionContext::from_process();
//!     let settings = settings_from_context(&ctx, Path::new("."))?;
//!     let config = resolve_config(None, &settings.build_dir)?;
//!
//!     let mut provisioner = Provisioner::new(settings, config, &SystemRunner, &HttpDownloader);
//!     provisioner.provision(ctx)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod monitoring;

// Re-export commonly used types
pub use config::{Distribution, Platform, ProvisionConfig, Settings};
pub use environment::ProvisionContext;
pub use error::{ProvisionError, Result};
pub use execution::Provisioner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ciprovision";
