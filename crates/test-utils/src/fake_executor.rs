use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use yesbuild::exec::{ChainExecutor, ExecutorFuture};
use yesbuild::report::Report;
use yesbuild::types::TaskName;
use yesbuild::watch::{ChainId, WatchEvent};

/// What the runtime asked the executor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorCall {
    Spawn { chain: ChainId, task: TaskName },
    Kill,
}

/// A fake chain executor that:
/// - records every spawn and kill
/// - unless held, immediately reports `LinkFinished` for each spawned link,
///   with an error report for tasks marked as failing.
pub struct FakeChainExecutor {
    events_tx: mpsc::Sender<WatchEvent>,
    calls: Arc<Mutex<Vec<ExecutorCall>>>,
    failing: HashSet<TaskName>,
    hold: bool,
}

impl FakeChainExecutor {
    pub fn new(events_tx: mpsc::Sender<WatchEvent>, calls: Arc<Mutex<Vec<ExecutorCall>>>) -> Self {
        Self {
            events_tx,
            calls,
            failing: HashSet::new(),
            hold: false,
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    /// Never finish links on their own; the test sends `LinkFinished`.
    pub fn hold(mut self) -> Self {
        self.hold = true;
        self
    }
}

impl ChainExecutor for FakeChainExecutor {
    fn spawn_link(&mut self, chain: ChainId, task: TaskName) -> ExecutorFuture<'_> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(ExecutorCall::Spawn {
                chain,
                task: task.clone(),
            });
            if self.hold {
                return Ok(());
            }

            let mut report = Report::new();
            report.plus_task_counter();
            if self.failing.contains(&task) {
                report.error(format!("Task '{task}' failed"));
            }

            // The runtime is busy awaiting us; deliver from another task.
            let tx = self.events_tx.clone();
            tokio::spawn(async move {
                let _ = tx
                    .send(WatchEvent::LinkFinished {
                        chain,
                        task,
                        report: Some(report),
                    })
                    .await;
            });
            Ok(())
        })
    }

    fn kill(&mut self) -> ExecutorFuture<'_> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(ExecutorCall::Kill);
            Ok(())
        })
    }
}

/// Spawned task names, in order.
pub fn spawned(calls: &Arc<Mutex<Vec<ExecutorCall>>>) -> Vec<TaskName> {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|call| match call {
            ExecutorCall::Spawn { task, .. } => Some(task.clone()),
            ExecutorCall::Kill => None,
        })
        .collect()
}
