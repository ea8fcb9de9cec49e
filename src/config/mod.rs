//! Configuration Module
//!
//! - [`model`]: Typed settings (`Platform`, `Distribution`, `Settings`) and YAML overrides
//! - [`parser`]: Reading the environment contract and config files

pub mod model;
pub mod parser;

pub use model::{CondaConfig, Distribution, Platform, ProvisionConfig, Settings, ToolingConfig};
pub use parser::{load_config, resolve_config, settings_from_context};
