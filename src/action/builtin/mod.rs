// src/action/builtin/mod.rs

//! Actions that ship with yesbuild.
//!
//! - [`AnotherTask`] (`internal:anotherTask`): depend on another task.
//! - [`Parallel`] (`internal:parallel`): build several tasks in child processes.
//! - [`CopyFiles`] (`internal:copy`): copy files into the build directory.
//! - [`Exec`] (`internal:exec`): run a program, optionally after the build.

mod another_task;
mod copy;
mod exec;
mod parallel;

pub use another_task::AnotherTask;
pub use copy::{CopyFiles, CopySource};
pub use exec::Exec;
pub use parallel::Parallel;
