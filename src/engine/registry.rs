// src/engine/registry.rs

//! Task definitions and the project handed to the CLI.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::action::builtin::AnotherTask;
use crate::action::{Action, ActionKind, ActionRegistry};
use crate::errors::Result;
use crate::product::Product;
use crate::types::TaskName;

/// What a finished action exposes to the rest of its task body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionResult {
    /// Products accumulated by the task so far.
    pub products: Vec<Product>,
    pub task_dir: PathBuf,
}

pub type BodyFuture =
    Pin<Box<dyn Future<Output = anyhow::Result<Option<Box<dyn Action>>>> + Send>>;

/// What a task callback returns.
pub enum TaskBody {
    Empty,
    Action(Box<dyn Action>),
    /// A body that yields actions through its [`TaskScope`] and may return a
    /// final action.
    Sequence(BodyFuture),
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Empty => f.write_str("Empty"),
            TaskBody::Action(action) => f.debug_tuple("Action").field(action).finish(),
            TaskBody::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}

impl TaskBody {
    pub fn action<A: ActionKind>(action: A) -> Self {
        TaskBody::Action(Box::new(action))
    }

    pub fn sequence<F>(body: F) -> Self
    where
        F: Future<Output = anyhow::Result<Option<Box<dyn Action>>>> + Send + 'static,
    {
        TaskBody::Sequence(Box::pin(body))
    }
}

/// A request from a running task body to the runner.
pub(crate) enum Yield {
    Run {
        action: Box<dyn Action>,
        reply: oneshot::Sender<ActionResult>,
    },
    Task {
        name: TaskName,
        reply: oneshot::Sender<ActionResult>,
    },
}

/// Handle a task body uses to hand actions to the runner.
#[derive(Clone)]
pub struct TaskScope {
    tx: mpsc::Sender<Yield>,
}

impl fmt::Debug for TaskScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScope").finish_non_exhaustive()
    }
}

impl TaskScope {
    pub(crate) fn new(tx: mpsc::Sender<Yield>) -> Self {
        Self { tx }
    }

    /// Execute `action` as the next step of this task and wait for its
    /// result. The action is recorded in the task node.
    pub async fn run<A: ActionKind>(&self, action: A) -> anyhow::Result<ActionResult> {
        self.run_boxed(Box::new(action)).await
    }

    pub async fn run_boxed(&self, action: Box<dyn Action>) -> anyhow::Result<ActionResult> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Yield::Run { action, reply })
            .await
            .map_err(|_| anyhow::anyhow!("task runner is gone"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("task runner dropped the action"))
    }

    /// Depend on `name` and get its result from this configure pass. The task
    /// must be defined before this one.
    pub async fn task(&self, name: impl Into<TaskName>) -> anyhow::Result<ActionResult> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Yield::Task {
                name: name.into(),
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("task runner is gone"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("task reference could not be resolved"))
    }
}

pub type TaskCallback = Arc<dyn Fn(TaskScope) -> TaskBody + Send + Sync>;

#[derive(Clone)]
pub struct TaskDefinition {
    pub name: TaskName,
    pub callback: TaskCallback,
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Task definitions in registration order.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskDefinition>,
}

impl TaskRegistry {
    /// Define `name`. Redefining a task replaces its callback and keeps its
    /// original position.
    pub fn define<F>(&mut self, name: impl Into<TaskName>, callback: F)
    where
        F: Fn(TaskScope) -> TaskBody + Send + Sync + 'static,
    {
        let name = name.into();
        let callback: TaskCallback = Arc::new(callback);
        match self.tasks.iter_mut().find(|t| t.name == name) {
            Some(existing) => {
                warn!(task = %name, "task defined twice; keeping the last definition");
                existing.callback = callback;
            }
            None => self.tasks.push(TaskDefinition { name, callback }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }
}

/// Callback fired in watch mode after a rebuild chain finished.
pub type BuildFinishedCallback = Arc<dyn Fn(&[TaskName]) + Send + Sync>;

/// A build definition: tasks, the actions they may store, and the extra
/// inputs whose change requires reconfiguration.
#[derive(Clone)]
pub struct Project {
    tasks: TaskRegistry,
    actions: ActionRegistry,
    meta_inputs: Vec<String>,
    on_build_finished: Vec<BuildFinishedCallback>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("tasks", &self.tasks)
            .field("actions", &self.actions)
            .field("meta_inputs", &self.meta_inputs)
            .finish_non_exhaustive()
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            tasks: TaskRegistry::default(),
            actions: ActionRegistry::with_builtins(),
            meta_inputs: Vec::new(),
            on_build_finished: Vec::new(),
        }
    }

    pub fn define<F>(&mut self, name: impl Into<TaskName>, callback: F) -> &mut Self
    where
        F: Fn(TaskScope) -> TaskBody + Send + Sync + 'static,
    {
        self.tasks.define(name, callback);
        self
    }

    pub fn register_action<A: ActionKind>(&mut self) -> Result<&mut Self> {
        self.actions.register::<A>()?;
        Ok(self)
    }

    /// Reconfigure whenever `path` changes.
    pub fn depend_file(&mut self, path: impl Into<String>) -> &mut Self {
        self.meta_inputs.push(path.into());
        self
    }

    pub fn on_build_finished<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&[TaskName]) + Send + Sync + 'static,
    {
        self.on_build_finished.push(Arc::new(callback));
        self
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn meta_inputs(&self) -> &[String] {
        &self.meta_inputs
    }

    pub fn build_finished_callbacks(&self) -> &[BuildFinishedCallback] {
        &self.on_build_finished
    }
}

/// Reference another task from a plain (non-sequence) body.
pub fn another_task(name: impl Into<TaskName>) -> TaskBody {
    TaskBody::action(AnotherTask::new(name))
}
