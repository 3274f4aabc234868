// src/dag/mod.rs

//! Persisted build graph and staleness scheduling.
//!
//! - [`node`] defines task nodes, action stores and the file envelopes.
//! - [`graph`] owns lazy loading, meta staleness and change-aware saving.
//! - [`mtime`] memoizes modification times for one invocation.
//! - [`scheduler`] walks dependency sets and decides what is stale.
//! - [`order`] turns the dirty set into an execution order.

pub mod graph;
pub mod mtime;
pub mod node;
pub mod order;
pub mod scheduler;

pub use graph::BuildGraph;
pub use mtime::MtimeCache;
pub use node::{ActionStore, TaskNode};
pub use scheduler::SchedulePlan;
