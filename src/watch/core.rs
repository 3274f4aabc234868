// src/watch/core.rs

//! Pure watch state machine.
//!
//! [`WatchCore`] consumes [`WatchEvent`]s and returns the commands the shell
//! must carry out. It owns no channels, timers or processes, so every
//! debounce and cancellation rule is testable synchronously.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::report::Report;
use crate::types::TaskName;

use super::index::WatchIndex;
use super::{ChainId, WatchCommand, WatchEvent, WatchStep};

#[derive(Debug)]
struct ActiveChain {
    id: ChainId,
    tasks: Vec<TaskName>,
    remaining: VecDeque<TaskName>,
}

#[derive(Debug)]
pub struct WatchCore {
    index: WatchIndex,
    debounce: Duration,
    /// Affected entries waiting for the debounce window; the last change wins.
    pending: Option<Vec<TaskName>>,
    debounce_token: u64,
    chain: Option<ActiveChain>,
    next_chain: ChainId,
}

impl WatchCore {
    pub fn new(index: WatchIndex, debounce: Duration) -> Self {
        Self {
            index,
            debounce,
            pending: None,
            debounce_token: 0,
            chain: None,
            next_chain: 1,
        }
    }

    pub fn index(&self) -> &WatchIndex {
        &self.index
    }

    pub fn replace_index(&mut self, index: WatchIndex) {
        self.index = index;
    }

    /// Whether a chain is in flight (for tests).
    pub fn is_building(&self) -> bool {
        self.chain.is_some()
    }

    pub fn step(&mut self, event: WatchEvent) -> WatchStep {
        match event {
            WatchEvent::FileChanged { path } => self.on_file_changed(&path),
            WatchEvent::DebounceElapsed { token } => self.on_debounce_elapsed(token),
            WatchEvent::LinkFinished {
                chain,
                task,
                report,
            } => self.on_link_finished(chain, task, report),
            WatchEvent::Shutdown => self.on_shutdown(),
        }
    }

    fn on_file_changed(&mut self, path: &str) -> WatchStep {
        let affected = self.index.affected(path);
        if affected.is_empty() {
            return WatchStep::idle();
        }
        debug!(path, tasks = ?affected, "tracked file changed");

        self.pending = Some(affected.to_vec());
        self.debounce_token += 1;
        WatchStep::run(vec![WatchCommand::ArmDebounce {
            token: self.debounce_token,
            delay: self.debounce,
        }])
    }

    fn on_debounce_elapsed(&mut self, token: u64) -> WatchStep {
        if token != self.debounce_token {
            return WatchStep::idle();
        }
        let Some(tasks) = self.pending.take() else {
            return WatchStep::idle();
        };

        let mut commands = Vec::new();
        if let Some(old) = self.chain.take() {
            info!(chain = old.id, dropped = ?old.remaining, "restarting build chain");
            commands.push(WatchCommand::KillChain);
        }

        let id = self.next_chain;
        self.next_chain += 1;
        let mut remaining: VecDeque<TaskName> = tasks.iter().cloned().collect();
        if let Some(first) = remaining.pop_front() {
            info!(chain = id, tasks = ?tasks, "starting build chain");
            commands.push(WatchCommand::SpawnLink {
                chain: id,
                task: first,
            });
            self.chain = Some(ActiveChain {
                id,
                tasks,
                remaining,
            });
        }

        WatchStep::run(commands)
    }

    fn on_link_finished(
        &mut self,
        chain: ChainId,
        task: TaskName,
        report: Option<Report>,
    ) -> WatchStep {
        let Some(active) = self.chain.as_mut().filter(|c| c.id == chain) else {
            debug!(chain, task = %task, "ignoring link of a stale chain");
            return WatchStep::idle();
        };

        let mut commands = vec![WatchCommand::ReloadTask(task.clone())];

        if report.as_ref().is_some_and(Report::has_errors) {
            warn!(chain, task = %task, "build failed; stopping chain");
            self.chain = None;
            return WatchStep::run(commands);
        }

        match active.remaining.pop_front() {
            Some(next) => commands.push(WatchCommand::SpawnLink { chain, task: next }),
            None => {
                let tasks = std::mem::take(&mut active.tasks);
                info!(chain, "build chain finished");
                self.chain = None;
                commands.push(WatchCommand::RunFinishedHooks { tasks });
            }
        }

        WatchStep::run(commands)
    }

    fn on_shutdown(&mut self) -> WatchStep {
        let mut commands = Vec::new();
        if self.chain.take().is_some() {
            commands.push(WatchCommand::KillChain);
        }
        self.pending = None;
        commands.push(WatchCommand::Exit);
        WatchStep {
            commands,
            keep_running: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dag::{BuildGraph, TaskNode};
    use crate::dependency::{DepLiteral, Dependencies};
    use crate::fs::mock::MockFileSystem;

    const DELAY: Duration = Duration::from_millis(300);

    fn core() -> WatchCore {
        let mut graph = BuildGraph::new("build", Arc::new(MockFileSystem::new()));
        for (task, file) in [("css", "src/site.css"), ("page", "src/site.css")] {
            graph.insert_task(
                task,
                TaskNode {
                    deps: Some(Dependencies::sorted(vec![DepLiteral::file(file)])),
                    ..TaskNode::default()
                },
            );
        }
        let index = WatchIndex::build(&mut graph, &["css".into(), "page".into()]).unwrap();
        WatchCore::new(index, DELAY)
    }

    fn changed(path: &str) -> WatchEvent {
        WatchEvent::FileChanged { path: path.into() }
    }

    fn finished(chain: ChainId, task: &str) -> WatchEvent {
        WatchEvent::LinkFinished {
            chain,
            task: task.into(),
            report: Some(Report::new()),
        }
    }

    fn spawn(chain: ChainId, task: &str) -> WatchCommand {
        WatchCommand::SpawnLink {
            chain,
            task: task.into(),
        }
    }

    #[test]
    fn untracked_changes_do_nothing() {
        let mut core = core();
        assert_eq!(core.step(changed("README.md")), WatchStep::idle());
    }

    #[test]
    fn bursts_coalesce_into_one_chain() {
        let mut core = core();
        core.step(changed("src/site.css"));
        core.step(changed("src/site.css"));
        let last = core.step(changed("src/site.css"));
        assert_eq!(
            last.commands,
            vec![WatchCommand::ArmDebounce { token: 3, delay: DELAY }]
        );

        assert!(core.step(WatchEvent::DebounceElapsed { token: 1 }).commands.is_empty());
        assert!(core.step(WatchEvent::DebounceElapsed { token: 2 }).commands.is_empty());
        let step = core.step(WatchEvent::DebounceElapsed { token: 3 });
        assert_eq!(step.commands, vec![spawn(1, "css")]);
    }

    #[test]
    fn chain_links_run_in_order_then_fire_hooks() {
        let mut core = core();
        core.step(changed("src/site.css"));
        core.step(WatchEvent::DebounceElapsed { token: 1 });

        let step = core.step(finished(1, "css"));
        assert_eq!(
            step.commands,
            vec![WatchCommand::ReloadTask("css".into()), spawn(1, "page")]
        );

        let step = core.step(finished(1, "page"));
        assert_eq!(
            step.commands,
            vec![
                WatchCommand::ReloadTask("page".into()),
                WatchCommand::RunFinishedHooks {
                    tasks: vec!["css".into(), "page".into()]
                },
            ]
        );
        assert!(!core.is_building());
    }

    #[test]
    fn new_chain_kills_the_running_one_and_ignores_its_links() {
        let mut core = core();
        core.step(changed("src/site.css"));
        core.step(WatchEvent::DebounceElapsed { token: 1 });

        core.step(changed("src/site.css"));
        let step = core.step(WatchEvent::DebounceElapsed { token: 2 });
        assert_eq!(step.commands, vec![WatchCommand::KillChain, spawn(2, "css")]);

        assert_eq!(core.step(finished(1, "css")), WatchStep::idle());
        let step = core.step(finished(2, "css"));
        assert_eq!(step.commands[1], spawn(2, "page"));
    }

    #[test]
    fn failed_link_stops_the_chain_without_hooks() {
        let mut core = core();
        core.step(changed("src/site.css"));
        core.step(WatchEvent::DebounceElapsed { token: 1 });

        let mut report = Report::new();
        report.error("boom");
        let step = core.step(WatchEvent::LinkFinished {
            chain: 1,
            task: "css".into(),
            report: Some(report),
        });
        assert_eq!(step.commands, vec![WatchCommand::ReloadTask("css".into())]);
        assert!(!core.is_building());
    }

    #[test]
    fn shutdown_kills_and_exits() {
        let mut core = core();
        core.step(changed("src/site.css"));
        core.step(WatchEvent::DebounceElapsed { token: 1 });

        let step = core.step(WatchEvent::Shutdown);
        assert!(!step.keep_running);
        assert_eq!(step.commands, vec![WatchCommand::KillChain, WatchCommand::Exit]);
    }
}
