// src/dependency/mod.rs

//! Dependency literals and the per-run dependency builder.
//!
//! - [`literal`] defines the `file://` / `task://` / `*` literals, the
//!   recorded [`Dependencies`] set, equality and merge.
//! - [`builder`] accumulates literals reported by actions.

pub mod builder;
pub mod literal;

pub use builder::{DependencyBuilder, ManagedDirPolicy};
pub use literal::{DepLiteral, Dependencies};
