// src/dag/node.rs

//! Persisted task records and their on-disk envelopes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dependency::Dependencies;
use crate::types::TaskName;

/// Version tag written into every task and meta file.
pub const FILE_VERSION: &str = "1.0";

const TASK_FILE_PREFIX: &str = "yesbuild.";
const TASK_FILE_SUFFIX: &str = ".json";
const META_FILE_NAME: &str = "yesbuild.json";

/// A serialized action: registered kind name plus its props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStore {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub props: serde_json::Value,
}

impl ActionStore {
    pub fn new(name: impl Into<String>, props: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }
}

/// Everything recorded about one task.
///
/// `actions` is in execution order. `deps == None` means nothing is known
/// yet about what the task reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(default)]
    pub actions: Vec<ActionStore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Dependencies>,
    #[serde(default)]
    pub products: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NamedTaskNode {
    pub name: TaskName,
    #[serde(flatten)]
    pub node: TaskNode,
}

/// `yesbuild.<task>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TaskFile {
    pub version: String,
    #[serde(default)]
    pub tasks: Vec<NamedTaskNode>,
}

/// `yesbuild.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MetaFile {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Dependencies>,
}

pub fn task_file_path(build_dir: &Path, task: &str) -> PathBuf {
    build_dir.join(format!("{TASK_FILE_PREFIX}{task}{TASK_FILE_SUFFIX}"))
}

pub fn meta_file_path(build_dir: &Path) -> PathBuf {
    build_dir.join(META_FILE_NAME)
}

/// Recover the task name from a task file name, if it is one.
pub fn task_name_from_file(file_name: &str) -> Option<&str> {
    if file_name == META_FILE_NAME {
        return None;
    }
    let name = file_name
        .strip_prefix(TASK_FILE_PREFIX)?
        .strip_suffix(TASK_FILE_SUFFIX)?;
    (!name.is_empty()).then_some(name)
}
