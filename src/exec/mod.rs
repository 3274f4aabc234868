// src/exec/mod.rs

//! Child builds.
//!
//! - [`message`] encodes the one-line report a child writes for its parent.
//! - [`subprocess`] spawns a child build, captures its report and supports
//!   cancellation.
//! - [`backend`] provides the `ChainExecutor` trait and the production
//!   `RealChainExecutor` that the watch runtime uses, and which tests can
//!   replace with a fake implementation.

pub mod backend;
pub mod message;
pub mod subprocess;

pub use backend::{ChainExecutor, ExecutorFuture, RealChainExecutor};
pub use subprocess::{ChildOutcome, run_child_build};
