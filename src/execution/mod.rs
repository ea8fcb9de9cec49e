//! Provisioning Execution Module
//!
//! Runs the provisioning phases against external tools.
//!
//! # Architecture
//!
//! - [`provisioner`]: Phase ordering and the four provisioning operations
//! - [`runner`]: External command invocation
//! - [`download`]: Installer download

pub mod download;
pub mod provisioner;
pub mod runner;

pub use download::{Downloader, HttpDownloader};
pub use provisioner::Provisioner;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
