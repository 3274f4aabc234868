// src/watch/mod.rs

//! Watch mode: rebuild entry tasks when their inputs change.
//!
//! - [`index`] maps input files to the entry tasks reading them.
//! - [`core`] is the pure state machine: debounce, chains, cancellation.
//! - [`runtime`] is the async shell feeding events into the core and
//!   executing its commands.
//! - [`watcher`] bridges `notify` into [`WatchEvent::FileChanged`].
//!
//! At most one build chain is in flight. A chain runs one child build per
//! affected entry task, one after the other; starting a new chain kills the
//! running one and drops whatever it had left.

use std::time::Duration;

use crate::report::Report;
use crate::types::TaskName;

pub mod core;
pub mod index;
pub mod runtime;
pub mod watcher;

pub use self::core::WatchCore;
pub use index::WatchIndex;
pub use runtime::WatchRuntime;
pub use watcher::{WatcherHandle, spawn_watcher};

/// Identifies one build chain; links of an older chain are ignored.
pub type ChainId = u64;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Events flowing into the watch runtime.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A file below the project root changed; `path` is relative to it.
    FileChanged { path: String },
    /// The debounce window armed with `token` closed.
    DebounceElapsed { token: u64 },
    /// A child build of `chain` exited on its own.
    LinkFinished {
        chain: ChainId,
        task: TaskName,
        report: Option<Report>,
    },
    /// Ctrl-C.
    Shutdown,
}

/// What the core asks the shell to do.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchCommand {
    ArmDebounce { token: u64, delay: Duration },
    KillChain,
    SpawnLink { chain: ChainId, task: TaskName },
    /// Re-read the task node from disk and refresh the index.
    ReloadTask(TaskName),
    RunFinishedHooks { tasks: Vec<TaskName> },
    Exit,
}

/// Result of one call to [`WatchCore::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchStep {
    pub commands: Vec<WatchCommand>,
    pub keep_running: bool,
}

impl WatchStep {
    pub fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }

    pub fn run(commands: Vec<WatchCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}
