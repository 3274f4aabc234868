// src/action/builtin/another_task.rs

use serde::{Deserialize, Serialize};

use crate::action::{ActionFuture, ActionKind, ExecutionContext};
use crate::types::{Stage, TaskName};

/// Records a `task://` dependency at configure time; does nothing at build
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnotherTask {
    pub name: TaskName,
}

impl AnotherTask {
    pub fn new(name: impl Into<TaskName>) -> Self {
        Self { name: name.into() }
    }
}

impl ActionKind for AnotherTask {
    const NAME: &'static str = "internal:anotherTask";

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            if ctx.stage == Stage::Configure {
                ctx.deps.depend_task(self.name.as_str());
            }
            Ok(())
        })
    }
}
