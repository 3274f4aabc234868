// src/dag/scheduler.rs

//! Staleness checks over a [`BuildGraph`].
//!
//! Starting from an entry task the dependency sets are walked recursively:
//! `task://` literals become edges, `file://` literals are grouped by file so
//! each input is compared once against the products of every task reading
//! it. The dirty set is then ordered with [`execution_order`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::dag::graph::BuildGraph;
use crate::dag::mtime::MtimeCache;
use crate::dag::order::execution_order;
use crate::dependency::{DepLiteral, Dependencies};
use crate::errors::{Result, YesbuildError};
use crate::types::{ALL_TASKS, TaskName};

/// What a build has to do, in order, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePlan {
    pub order: Vec<TaskName>,
    /// Inputs found newer than (or missing next to) the products of the tasks
    /// reading them.
    pub changed_files: Vec<String>,
}

impl SchedulePlan {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Result of walking the dependency sets below one or more entry tasks.
#[derive(Debug, Default)]
struct DependencyCollector {
    /// filename -> tasks depending on it, in discovery order.
    file_deps: BTreeMap<String, Vec<TaskName>>,
    /// task -> tasks it depends on.
    task_deps: HashMap<TaskName, Vec<TaskName>>,
    /// task -> tasks depending on it.
    dependents: HashMap<TaskName, Vec<TaskName>>,
    visited: Vec<TaskName>,
    seen: HashSet<TaskName>,
    to_update: HashSet<TaskName>,
}

impl DependencyCollector {
    /// Returns false if `task` was already walked.
    fn visit(&mut self, task: &str) -> bool {
        if !self.seen.insert(task.to_string()) {
            return false;
        }
        self.visited.push(task.to_string());
        true
    }

    fn push_file(&mut self, file: &str, task: &str) {
        let tasks = self.file_deps.entry(file.to_string()).or_default();
        if !tasks.iter().any(|t| t == task) {
            tasks.push(task.to_string());
        }
    }

    fn push_edge(&mut self, parent: &str, child: &str) {
        self.task_deps
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        self.dependents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());
    }

    fn mark<'a>(&mut self, tasks: impl IntoIterator<Item = &'a TaskName>) {
        self.to_update.extend(tasks.into_iter().cloned());
    }

    /// Everything depending (transitively) on a dirty task is dirty too.
    fn propagate_to_dependents(&mut self) {
        let mut queue: VecDeque<TaskName> = self.to_update.iter().cloned().collect();
        while let Some(task) = queue.pop_front() {
            let Some(parents) = self.dependents.get(&task) else {
                continue;
            };
            for parent in parents {
                if self.to_update.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
        }
    }

    /// Dirty tasks in discovery order.
    fn dirty_in_walk_order(&self) -> Vec<TaskName> {
        self.visited
            .iter()
            .filter(|t| self.to_update.contains(*t))
            .cloned()
            .collect()
    }
}

impl BuildGraph {
    /// Decide which tasks below `entry` must run, and in what order.
    ///
    /// `entry == "*"` schedules every known task. With `force` the entry and
    /// everything reachable from it are scheduled without looking at mtimes.
    pub fn check_dependencies_updated(
        &mut self,
        entry: &str,
        force: bool,
        mtimes: &mut MtimeCache,
    ) -> Result<SchedulePlan> {
        let mut collector = DependencyCollector::default();
        let mut changed_files = Vec::new();

        if entry == ALL_TASKS {
            let all = self.known_tasks()?;
            for task in &all {
                self.collect_task(&mut collector, task)?;
            }
            collector.mark(&all);
        } else {
            self.require_task(entry)?;
            self.collect_task(&mut collector, entry)?;

            if force {
                let reachable = collector.visited.clone();
                collector.mark(&reachable);
            } else {
                changed_files = self.check_file_deps(&mut collector, mtimes);
                collector.propagate_to_dependents();
            }
        }

        let order = execution_order(&collector.dirty_in_walk_order(), &collector.task_deps)?;
        info!(entry, force, tasks = ?order, changed = ?changed_files, "tasks need update");
        Ok(SchedulePlan {
            order,
            changed_files,
        })
    }

    /// Every `file://` input reachable from `entry`.
    pub fn collect_all_file_deps(&mut self, entry: &str) -> Result<Vec<String>> {
        self.require_task(entry)?;
        let mut collector = DependencyCollector::default();
        self.collect_task(&mut collector, entry)?;
        Ok(collector.file_deps.into_keys().collect())
    }

    fn collect_task(&mut self, collector: &mut DependencyCollector, task: &str) -> Result<()> {
        if !collector.visit(task) {
            return Ok(());
        }

        let deps = self
            .load_task(task)?
            .ok_or_else(|| YesbuildError::ConfigError(format!("Can not find task {task}")))?
            .deps
            .clone();

        match deps {
            None => {}
            Some(Dependencies::Always) => {
                collector.to_update.insert(task.to_string());
            }
            Some(Dependencies::List(literals)) => {
                for literal in literals {
                    match literal {
                        DepLiteral::File(path) => collector.push_file(&path, task),
                        DepLiteral::Task(child) => {
                            collector.push_edge(task, &child);
                            self.collect_task(collector, &child)?;
                        }
                        DepLiteral::Always => {
                            warn!(task, "`*` inside a dependency list is ignored");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Compare each grouped input against the products of its readers and
    /// mark stale readers. Returns the inputs that caused a rebuild.
    fn check_file_deps(
        &self,
        collector: &mut DependencyCollector,
        mtimes: &mut MtimeCache,
    ) -> Vec<String> {
        let mut changed = Vec::new();

        for (file, tasks) in &collector.file_deps {
            let products: Vec<String> = tasks
                .iter()
                .filter_map(|t| self.task(t))
                .flat_map(|node| node.products.iter().cloned())
                .collect();

            let stale = match mtimes.latest(products.iter().map(String::as_str)) {
                Ok(None) => continue,
                Err(missing) => {
                    debug!(file = %file, product = %missing, "product missing");
                    true
                }
                Ok(Some(latest)) => match mtimes.get(file) {
                    None => {
                        debug!(file = %file, "input missing");
                        true
                    }
                    Some(mtime) => mtime > latest,
                },
            };

            if stale {
                collector.to_update.extend(tasks.iter().cloned());
                changed.push(file.clone());
            }
        }

        changed
    }
}
