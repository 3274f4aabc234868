// src/engine/mod.rs

//! Configuration and build passes.
//!
//! This module ties together:
//! - the task registry a build definition fills in ([`registry`])
//! - the runner that drives task bodies at configure time ([`runner`])
//! - the configure pass that writes the build graph ([`configure`])
//! - the incremental build driver that replays stale tasks ([`build`])

pub mod build;
pub mod configure;
pub mod registry;
pub mod runner;

pub use build::{BuildOptions, build};
pub use configure::configure;
pub use registry::{
    ActionResult, BuildFinishedCallback, Project, TaskBody, TaskRegistry, TaskScope, another_task,
};
pub use runner::TaskRunner;
