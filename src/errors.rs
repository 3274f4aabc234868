// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum YesbuildError {
    /// Broken build definition or state: unsupported literal kinds, missing
    /// referenced tasks, invalid `yesbuild.toml`.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskName),

    #[error("Dead loop detected for tasks: {}", .0.join(", "))]
    Cycle(Vec<TaskName>),

    #[error("Unrecognized action '{action}', can not rebuild task '{task}'")]
    UnknownAction { action: String, task: TaskName },

    #[error("Action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("Task '{task}' failed: {source}")]
    ActionFailed {
        task: TaskName,
        #[source]
        source: anyhow::Error,
    },

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, YesbuildError>;
