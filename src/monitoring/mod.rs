//! Monitoring Module
//!
//! Phase timing for the provisioning run.

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, PhaseTiming, TimelineEvent};
