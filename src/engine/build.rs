// src/engine/build.rs

//! Incremental build driver.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::action::{ExecutionContext, Session};
use crate::dag::node::task_file_path;
use crate::dag::{BuildGraph, MtimeCache};
use crate::dependency::Dependencies;
use crate::errors::{Result, YesbuildError};
use crate::types::{ALL_TASKS, BuildFlags, Stage, TaskName};

use super::configure::configure;
use super::registry::Project;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub build_dir: PathBuf,
    /// Entry task, or `*` for every known task.
    pub task: TaskName,
    pub flags: BuildFlags,
    /// Config file to record as a meta input when reconfiguring.
    pub config_file: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(build_dir: impl Into<PathBuf>, task: impl Into<TaskName>) -> Self {
        Self {
            build_dir: build_dir.into(),
            task: task.into(),
            flags: BuildFlags::default(),
            config_file: None,
        }
    }

    pub fn with_flags(mut self, flags: BuildFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }
}

/// Bring the build directory up to date for `options.task`.
///
/// A missing build directory is only configured. Nodes of tasks that ran
/// before a failure are still saved.
pub async fn build(project: &Project, session: &Session, options: &BuildOptions) -> Result<()> {
    let mut graph = BuildGraph::new(&options.build_dir, session.fs.clone());
    let config_file = options.config_file.as_deref();

    if !graph.exists_on_disk() {
        info!(build_dir = %options.build_dir.display(), "build directory missing, configuring");
        return configure(project, session, &mut graph, config_file).await;
    }

    let mut mtimes = MtimeCache::new(session.fs.clone());
    if !options.flags.ignore_meta {
        if let Some(changed) = graph.needs_reconfig(&mut mtimes)? {
            info!(file = %changed, "build definition changed, reconfiguring");
            configure(project, session, &mut graph, config_file).await?;
            mtimes.clear();
        }
    }

    let plan = graph.check_dependencies_updated(&options.task, options.flags.force, &mut mtimes)?;
    if plan.is_empty() {
        debug!(task = %options.task, "nothing to do");
        return Ok(());
    }

    let changed_files = if options.flags.force || options.task == ALL_TASKS {
        None
    } else {
        Some(plan.changed_files.clone())
    };

    let mut outcome = Ok(());
    for task in &plan.order {
        outcome = rebuild_task(
            project,
            session,
            &mut graph,
            task,
            options.flags.force,
            changed_files.clone(),
        )
        .await;
        if outcome.is_err() {
            break;
        }
    }

    let written = graph.save_changed()?;
    if !written.is_empty() {
        debug!(tasks = ?written, "rewrote task nodes");
    }
    outcome
}

/// Replay the stored actions of `task` in the build stage.
async fn rebuild_task(
    project: &Project,
    session: &Session,
    graph: &mut BuildGraph,
    task: &str,
    force: bool,
    changed_files: Option<Vec<String>>,
) -> Result<()> {
    let node = graph.require_task(task)?.clone();
    info!(task, actions = node.actions.len(), "running task");
    session.report.lock().plus_task_counter();

    let mut ctx = ExecutionContext::new(session, Stage::Build, graph.build_dir(), task)
        .with_force_update(force)
        .with_changed_files(changed_files);

    for store in &node.actions {
        let action = project.actions().instantiate(store, task)?;
        action
            .execute(&mut ctx)
            .await
            .map_err(|source| YesbuildError::ActionFailed {
                task: task.to_string(),
                source,
            })?;
    }

    let deps = Dependencies::merge(node.deps.clone(), ctx.deps.finalize());
    let products = ctx.products.finalize();
    let product_files: Vec<String> = products.iter().map(|p| p.file.clone()).collect();

    let deps_changed = !Dependencies::equals(node.deps.as_ref(), deps.as_ref());
    if deps_changed || product_files != node.products {
        debug!(task, deps_changed, "task node changed");
        if let Some(stored) = graph.task_mut(task) {
            stored.deps = deps;
            stored.products = product_files;
        }
        graph.mark_changed(task);
        let path = task_file_path(graph.build_dir(), task);
        session
            .report
            .lock()
            .add_updated_file(path.to_string_lossy().into_owned());
    }

    session.report.lock().add_outputs(products);
    Ok(())
}
