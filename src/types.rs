// src/types.rs

//! Small shared types used across the scheduler, the action protocol and the
//! CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Entry point meaning "every known task".
pub const ALL_TASKS: &str = "*";

/// Which pass an action is being executed in.
///
/// - `Configure`: the task body is being driven to (re)derive the graph.
/// - `Build`: the stored actions of a stale task are being replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configure,
    Build,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configure => f.write_str("configure"),
            Stage::Build => f.write_str("build"),
        }
    }
}

/// How an invocation reports its result.
///
/// - `Readable`: human summary on stdout (interactive use).
/// - `Json`: exactly one structured report message, used by subprocess builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Readable,
    Json,
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "readable" | "text" => Ok(LogMode::Readable),
            "json" => Ok(LogMode::Json),
            other => Err(format!(
                "invalid log mode: {other} (expected \"readable\" or \"json\")"
            )),
        }
    }
}

/// Flags shared by the build driver and subprocess invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildFlags {
    /// Rebuild the entry and its whole subtree without checking mtimes.
    pub force: bool,
    /// Skip the meta (build definition) staleness check.
    pub ignore_meta: bool,
}
