// src/action/builtin/parallel.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::action::{ActionFuture, ActionKind, ExecutionContext};
use crate::exec::subprocess::run_child_build;
use crate::types::{Stage, TaskName};

/// Builds the named tasks concurrently, one child process each.
///
/// It cannot know the staleness of its children without re-deriving their
/// subgraphs, so it always runs; each child decides for itself what to
/// rebuild. Child reports are merged into this invocation's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parallel {
    pub tasks: Vec<TaskName>,
}

impl Parallel {
    pub fn new<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        Self {
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }
}

impl ActionKind for Parallel {
    const NAME: &'static str = "internal:parallel";

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            ctx.deps.depend_always();
            if ctx.stage == Stage::Configure {
                return Ok(());
            }

            let mut children = JoinSet::new();
            for task in &self.tasks {
                let invoker = Arc::clone(&ctx.invoker);
                let build_dir = ctx.build_dir.clone();
                let force = ctx.force_update;
                let task = task.clone();
                children.spawn(async move {
                    let outcome = run_child_build(&invoker, &build_dir, &task, force, None).await;
                    (task, outcome)
                });
            }

            while let Some(joined) = children.join_next().await {
                let mut report = ctx.report.lock();
                match joined {
                    Ok((task, Ok(outcome))) => {
                        if let Some(child) = outcome.into_report(&task) {
                            info!(
                                task = %task,
                                tasks = child.task_count,
                                errors = child.errors.len(),
                                "child build finished"
                            );
                            report.merge(child);
                        }
                    }
                    Ok((task, Err(e))) => {
                        error!(task = %task, error = %e, "child build failed to run");
                        report.error(format!("Task '{task}' failed to run: {e:#}"));
                    }
                    Err(e) => {
                        error!(error = %e, "child build panicked");
                        report.error(format!("A child build panicked: {e}"));
                    }
                }
            }

            Ok(())
        })
    }
}
