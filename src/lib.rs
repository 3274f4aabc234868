// src/lib.rs

//! yesbuild: an incremental build orchestrator.
//!
//! A build program defines named tasks on a [`Project`] and hands it to
//! [`run`]. Configuring drives every task body once and records each task's
//! actions, dependencies and products under the build directory; later
//! builds replay only the tasks whose inputs changed.

pub mod action;
pub mod cli;
pub mod config;
pub mod dag;
pub mod dependency;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod product;
pub mod report;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use crate::action::builtin::{AnotherTask, CopyFiles, CopySource, Exec, Parallel};
pub use crate::action::{Action, ActionKind, ExecutionContext, Session};
pub use crate::engine::{
    ActionResult, BuildOptions, Project, TaskBody, TaskScope, another_task, build, configure,
};

use crate::cli::{BuildArgs, CliArgs, Command};
use crate::config::{ConfigFile, load_or_default};
use crate::dag::BuildGraph;
use crate::dependency::ManagedDirPolicy;
use crate::exec::RealChainExecutor;
use crate::exec::message::encode_report;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{BuildFlags, LogMode, TaskName};
use crate::watch::watcher::{WatchFilter, relative_str};
use crate::watch::{WatchEvent, WatchIndex, WatchRuntime};

/// Parse the command line, set up logging and run `project`.
///
/// Meant to be the whole of a build program's `main`.
pub async fn run(project: Project) -> Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run_with_args(project, args).await
}

/// Run `project` with already parsed arguments.
pub async fn run_with_args(project: Project, args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let (config, config_file) = load_or_default(fs.as_ref(), args.config.as_deref())?;

    let mut invoker = action::SelfInvoker::current()?;
    if let Some(path) = &args.config {
        // Children must read the same config file.
        invoker = invoker.with_base_args(["--config".to_string(), path.display().to_string()]);
    }
    let session = Session::new(Arc::clone(&fs), invoker)
        .with_policy(ManagedDirPolicy::from(&config.dependencies));

    match args.command {
        Command::Config { out } => {
            let build_dir = out.unwrap_or_else(|| PathBuf::from(&config.build.dir));
            info!(dir = %build_dir.display(), "configuring");
            let mut graph = BuildGraph::new(&build_dir, Arc::clone(&fs));
            let result = configure(&project, &session, &mut graph, config_file.as_deref()).await;
            finish(&session, LogMode::Readable, result).await
        }
        Command::Build(build_args) => {
            let options = build_options(&config, config_file, &build_args);
            debug!(?options, "building");
            let result = build(&project, &session, &options).await;
            finish(&session, build_args.log, result).await
        }
        Command::Watch { tasks, dir } => {
            let build_dir = dir.unwrap_or_else(|| PathBuf::from(&config.build.dir));
            let entries = if tasks.is_empty() {
                vec![config.build.default_task.clone()]
            } else {
                tasks
            };
            run_watch(&project, &session, &config, config_file, build_dir, entries).await
        }
    }
}

fn build_options(
    config: &ConfigFile,
    config_file: Option<PathBuf>,
    args: &BuildArgs,
) -> BuildOptions {
    let build_dir = args
        .build_dir()
        .unwrap_or_else(|| PathBuf::from(&config.build.dir));
    let task = args
        .task
        .clone()
        .unwrap_or_else(|| config.build.default_task.clone());

    BuildOptions::new(build_dir, task)
        .with_flags(BuildFlags {
            force: args.force,
            ignore_meta: args.ignore_meta,
        })
        .with_config_file(config_file)
}

/// Print the report in `mode`, then run completion hooks if nothing failed.
async fn finish(session: &Session, mode: LogMode, result: errors::Result<()>) -> Result<()> {
    let report = {
        let mut report = session.report.lock();
        if let Err(e) = &result {
            // Tasks that failed to configure are already listed.
            if !report.has_errors() {
                report.error(e.to_string());
            }
        }
        report.finish();
        report.clone()
    };

    match mode {
        LogMode::Readable => println!("{}", report.render()),
        LogMode::Json => println!("{}", encode_report(&report)?),
    }

    result?;
    if report.has_errors() {
        anyhow::bail!("build finished with {} error(s)", report.errors.len());
    }

    session.hooks.run_all().await
}

async fn run_watch(
    project: &Project,
    session: &Session,
    config: &ConfigFile,
    config_file: Option<PathBuf>,
    build_dir: PathBuf,
    entries: Vec<TaskName>,
) -> Result<()> {
    // Fail before building when the recorded graph already rules an entry out.
    WatchIndex::check_entries(
        &mut BuildGraph::new(&build_dir, Arc::clone(&session.fs)),
        &entries,
    )?;

    for entry in &entries {
        let options = BuildOptions::new(&build_dir, entry).with_config_file(config_file.clone());
        build(project, session, &options).await?;
    }

    let report = {
        let mut report = session.report.lock();
        report.finish();
        report.clone()
    };
    println!("{}", report.render());
    if report.has_errors() {
        anyhow::bail!("initial build finished with {} error(s)", report.errors.len());
    }

    let (events_tx, events_rx) = mpsc::channel::<WatchEvent>(64);

    let graph = BuildGraph::new(&build_dir, Arc::clone(&session.fs));
    let executor =
        RealChainExecutor::new(Arc::clone(&session.invoker), &build_dir, events_tx.clone());
    let runtime = WatchRuntime::new(graph, entries, config.debounce(), events_rx, executor)?
        .with_finished_callbacks(project.build_finished_callbacks().to_vec());

    // Hooks may wait on long-running programs; they must not hold up watching.
    let hooks = session.hooks.clone();
    tokio::spawn(async move {
        if let Err(e) = hooks.run_all().await {
            warn!(error = %e, "completion hook failed");
        }
    });

    let root = std::env::current_dir()?;
    let filter = WatchFilter {
        build_dir: watch_relative(&root, &build_dir),
        ignore: config.ignore_set().clone(),
    };
    let _watcher = watch::spawn_watcher(&root, filter, events_tx.clone())?;

    // Ctrl-C -> graceful shutdown.
    {
        let tx = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(WatchEvent::Shutdown).await;
        });
    }
    drop(events_tx);

    runtime.run().await?;
    Ok(())
}

fn watch_relative(root: &Path, build_dir: &Path) -> String {
    if build_dir.is_absolute() {
        relative_str(root, build_dir).unwrap_or_else(|| build_dir.display().to_string())
    } else {
        build_dir.to_string_lossy().replace('\\', "/")
    }
}
