// src/engine/runner.rs

//! Drives task bodies at configure time.
//!
//! A sequence body runs as an ordinary future. Each `scope.run(action)` sends
//! the action over a channel and waits on a oneshot; the runner executes the
//! action against the task's [`ExecutionContext`], records it, and replies
//! with the result so the body can decide its next step.

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::action::builtin::AnotherTask;
use crate::action::{Action, ActionKind, ExecutionContext, Session};
use crate::dag::{ActionStore, TaskNode};
use crate::errors::{Result, YesbuildError};
use crate::types::{Stage, TaskName};

use super::registry::{ActionResult, TaskBody, TaskDefinition, TaskScope, Yield};

/// Runs the task definitions of one configure pass.
///
/// Results of finished tasks are pooled so later tasks can reference them
/// through [`TaskScope::task`].
#[derive(Debug)]
pub struct TaskRunner<'a> {
    session: &'a Session,
    build_dir: &'a Path,
    pool: HashMap<TaskName, ActionResult>,
}

impl<'a> TaskRunner<'a> {
    pub fn new(session: &'a Session, build_dir: &'a Path) -> Self {
        Self {
            session,
            build_dir,
            pool: HashMap::new(),
        }
    }

    pub fn result_of(&self, task: &str) -> Option<&ActionResult> {
        self.pool.get(task)
    }

    /// Drive one task body to completion and build its node.
    ///
    /// Any failure aborts this task only; nothing is pooled for it.
    pub async fn configure_task(&mut self, def: &TaskDefinition) -> Result<TaskNode> {
        let name = def.name.as_str();
        info!(task = %name, "configuring task");

        let mut ctx = ExecutionContext::new(self.session, Stage::Configure, self.build_dir, name);
        let mut actions = Vec::new();

        let (tx, mut rx) = mpsc::channel(1);
        match (def.callback)(TaskScope::new(tx)) {
            TaskBody::Empty => {}
            TaskBody::Action(action) => {
                self.step(name, &mut ctx, action.as_ref(), &mut actions).await?;
            }
            TaskBody::Sequence(mut body) => {
                let last = loop {
                    tokio::select! {
                        biased;

                        Some(request) = rx.recv() => match request {
                            Yield::Run { action, reply } => {
                                self.step(name, &mut ctx, action.as_ref(), &mut actions).await?;
                                let _ = reply.send(ActionResult {
                                    products: ctx.products.finalize(),
                                    task_dir: ctx.task_dir.clone(),
                                });
                            }
                            Yield::Task { name: other, reply } => {
                                let result = self.reference(name, &mut ctx, &other).await?;
                                let _ = reply.send(result);
                            }
                        },

                        returned = &mut body => {
                            break returned.map_err(|source| YesbuildError::ActionFailed {
                                task: name.to_string(),
                                source,
                            })?;
                        }
                    }
                };

                if let Some(action) = last {
                    self.step(name, &mut ctx, action.as_ref(), &mut actions).await?;
                }
            }
        }

        let products = ctx.products.finalize();
        let node = TaskNode {
            actions,
            deps: ctx.deps.finalize(),
            products: products.iter().map(|p| p.file.clone()).collect(),
        };
        debug!(
            task = %name,
            actions = node.actions.len(),
            products = node.products.len(),
            "task configured"
        );

        {
            let mut report = self.session.report.lock();
            report.plus_task_counter();
            report.add_outputs(products.iter().cloned());
        }
        self.pool.insert(
            name.to_string(),
            ActionResult {
                products,
                task_dir: ctx.task_dir,
            },
        );
        Ok(node)
    }

    /// Execute one action of the task in the configure stage. References to
    /// other tasks add their dependency but are not stored.
    async fn step(
        &self,
        task: &str,
        ctx: &mut ExecutionContext,
        action: &dyn Action,
        actions: &mut Vec<ActionStore>,
    ) -> Result<()> {
        let store = action.store()?;

        action
            .execute(ctx)
            .await
            .map_err(|source| YesbuildError::ActionFailed {
                task: task.to_string(),
                source,
            })?;

        if store.name != AnotherTask::NAME {
            actions.push(store);
        }
        Ok(())
    }

    async fn reference(
        &self,
        task: &str,
        ctx: &mut ExecutionContext,
        other: &str,
    ) -> Result<ActionResult> {
        let result = self.pool.get(other).cloned().ok_or_else(|| {
            YesbuildError::ConfigError(format!(
                "task '{other}' is referenced before it was configured"
            ))
        })?;
        let reference = AnotherTask::new(other);
        self.step(task, ctx, &reference, &mut Vec::new()).await?;
        Ok(result)
    }
}
