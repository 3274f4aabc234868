// src/watch/runtime.rs

use std::fmt;
use std::future;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::dag::BuildGraph;
use crate::engine::BuildFinishedCallback;
use crate::errors::Result;
use crate::exec::ChainExecutor;
use crate::types::TaskName;

use super::core::WatchCore;
use super::index::WatchIndex;
use super::{WatchCommand, WatchEvent};

/// Feeds [`WatchEvent`]s into the [`WatchCore`] and carries out its
/// commands: the debounce timer, child builds through a [`ChainExecutor`],
/// task reloads and finished callbacks.
pub struct WatchRuntime<E: ChainExecutor> {
    core: WatchCore,
    graph: BuildGraph,
    entries: Vec<TaskName>,
    event_rx: mpsc::Receiver<WatchEvent>,
    executor: E,
    on_finished: Vec<BuildFinishedCallback>,
    debounce: Option<(Instant, u64)>,
}

impl<E: ChainExecutor> fmt::Debug for WatchRuntime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl<E: ChainExecutor> WatchRuntime<E> {
    /// Build the index for `entries` and set up the core.
    ///
    /// Fails if an entry is unknown or always rebuilds.
    pub fn new(
        mut graph: BuildGraph,
        entries: Vec<TaskName>,
        debounce: std::time::Duration,
        event_rx: mpsc::Receiver<WatchEvent>,
        executor: E,
    ) -> Result<Self> {
        let index = WatchIndex::build(&mut graph, &entries)?;
        info!(entries = ?entries, files = index.len(), "watching");
        Ok(Self {
            core: WatchCore::new(index, debounce),
            graph,
            entries,
            event_rx,
            executor,
            on_finished: Vec::new(),
            debounce: None,
        })
    }

    pub fn with_finished_callbacks(mut self, callbacks: Vec<BuildFinishedCallback>) -> Self {
        self.on_finished = callbacks;
        self
    }

    pub fn core(&self) -> &WatchCore {
        &self.core
    }

    /// Main event loop; returns on shutdown or when every sender is gone.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let event = tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("watch event channel closed; exiting");
                        break;
                    }
                },
                token = debounce_elapsed(self.debounce) => {
                    self.debounce = None;
                    WatchEvent::DebounceElapsed { token }
                }
            };

            debug!(?event, "watch runtime received event");
            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                break;
            }
        }

        info!("watch runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: WatchCommand) -> Result<()> {
        match command {
            WatchCommand::ArmDebounce { token, delay } => {
                self.debounce = Some((Instant::now() + delay, token));
            }
            WatchCommand::KillChain => self.executor.kill().await?,
            WatchCommand::SpawnLink { chain, task } => {
                self.executor.spawn_link(chain, task).await?;
            }
            WatchCommand::ReloadTask(task) => self.reload(&task),
            WatchCommand::RunFinishedHooks { tasks } => {
                for callback in &self.on_finished {
                    callback(&tasks);
                }
            }
            WatchCommand::Exit => info!("core requested exit"),
        }
        Ok(())
    }

    /// Re-read a task written by a child build and refresh the index. A
    /// broken node keeps the previous index.
    fn reload(&mut self, task: &str) {
        if let Err(e) = self.graph.force_reload_task(task) {
            warn!(task, error = %e, "failed to reload task node");
            return;
        }
        match WatchIndex::build(&mut self.graph, &self.entries) {
            Ok(index) => self.core.replace_index(index),
            Err(e) => warn!(error = %e, "keeping previous watch index"),
        }
    }
}

async fn debounce_elapsed(deadline: Option<(Instant, u64)>) -> u64 {
    match deadline {
        Some((at, token)) => {
            sleep_until(at).await;
            token
        }
        None => future::pending().await,
    }
}
