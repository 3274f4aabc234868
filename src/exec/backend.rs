// src/exec/backend.rs

//! Pluggable chain executor.
//!
//! The watch runtime talks to a [`ChainExecutor`] instead of spawning child
//! builds itself. Production uses [`RealChainExecutor`]; tests provide their
//! own implementation that records spawned links and emits
//! [`WatchEvent::LinkFinished`] directly.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::action::SelfInvoker;
use crate::errors::Result;
use crate::report::Report;
use crate::types::TaskName;
use crate::watch::{ChainId, WatchEvent};

use super::subprocess::run_child_build;

pub type ExecutorFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Runs the links of a build chain, one at a time.
pub trait ChainExecutor: Send {
    /// Start a child build of `task`. When it exits on its own, the
    /// implementation reports [`WatchEvent::LinkFinished`] for `chain`.
    fn spawn_link(&mut self, chain: ChainId, task: TaskName) -> ExecutorFuture<'_>;

    /// Kill the running link, if any. A killed link reports nothing.
    fn kill(&mut self) -> ExecutorFuture<'_>;
}

struct ActiveLink {
    task: TaskName,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Re-executes this program for each link.
pub struct RealChainExecutor {
    invoker: Arc<SelfInvoker>,
    build_dir: PathBuf,
    events_tx: mpsc::Sender<WatchEvent>,
    active: Option<ActiveLink>,
}

impl fmt::Debug for RealChainExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealChainExecutor")
            .field("build_dir", &self.build_dir)
            .field("active", &self.active.as_ref().map(|a| a.task.as_str()))
            .finish_non_exhaustive()
    }
}

impl RealChainExecutor {
    pub fn new(
        invoker: Arc<SelfInvoker>,
        build_dir: impl Into<PathBuf>,
        events_tx: mpsc::Sender<WatchEvent>,
    ) -> Self {
        Self {
            invoker,
            build_dir: build_dir.into(),
            events_tx,
            active: None,
        }
    }

    async fn stop_active(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.handle.is_finished() {
            return;
        }

        debug!(task = %active.task, "cancelling running link");
        if let Some(cancel) = active.cancel.take() {
            let _ = cancel.send(());
        }
        // An exited child can leave the link parked on a full event channel,
        // which only this runtime drains. Aborting drops the child, and
        // `kill_on_drop` takes it down with the task.
        active.handle.abort();
        match active.handle.await {
            Err(e) if !e.is_cancelled() => {
                warn!(task = %active.task, error = %e, "link task ended abnormally");
            }
            _ => {}
        }
    }
}

impl ChainExecutor for RealChainExecutor {
    fn spawn_link(&mut self, chain: ChainId, task: TaskName) -> ExecutorFuture<'_> {
        Box::pin(async move {
            self.stop_active().await;

            let (cancel_tx, cancel_rx) = oneshot::channel();
            let invoker = Arc::clone(&self.invoker);
            let build_dir = self.build_dir.clone();
            let events_tx = self.events_tx.clone();
            let link_task = task.clone();

            let handle = tokio::spawn(async move {
                let outcome =
                    run_child_build(&invoker, &build_dir, &link_task, false, Some(cancel_rx)).await;
                let report = match outcome {
                    Ok(outcome) => match outcome.into_report(&link_task) {
                        Some(report) => report,
                        None => return,
                    },
                    Err(e) => {
                        error!(task = %link_task, error = %e, "failed to run child build");
                        let mut report = Report::new();
                        report.error(format!("Task '{link_task}' failed to run: {e:#}"));
                        report
                    }
                };

                println!("{}", report.render());
                let event = WatchEvent::LinkFinished {
                    chain,
                    task: link_task,
                    report: Some(report),
                };
                if events_tx.send(event).await.is_err() {
                    debug!("watch runtime gone; dropping link result");
                }
            });

            self.active = Some(ActiveLink {
                task,
                cancel: Some(cancel_tx),
                handle,
            });
            Ok(())
        })
    }

    fn kill(&mut self) -> ExecutorFuture<'_> {
        Box::pin(async move {
            self.stop_active().await;
            Ok(())
        })
    }
}
