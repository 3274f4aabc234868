// src/exec/subprocess.rs

//! Child builds: this program re-executed for one task.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::action::SelfInvoker;
use crate::exec::message::decode_line;
use crate::report::Report;

/// How a child build ended.
#[derive(Debug)]
pub enum ChildOutcome {
    Finished {
        success: bool,
        report: Option<Report>,
    },
    /// Killed on request; nothing is reported for it.
    Cancelled,
}

impl ChildOutcome {
    /// Collapse into a report, turning a silent or failed exit into an error
    /// entry.
    pub fn into_report(self, task: &str) -> Option<Report> {
        match self {
            ChildOutcome::Cancelled => None,
            ChildOutcome::Finished { success, report } => {
                let mut report = report.unwrap_or_else(|| {
                    let mut r = Report::new();
                    r.error(format!("Task '{task}' did not report a result"));
                    r
                });
                if !success && !report.has_errors() {
                    report.error(format!("Task '{task}' exited with failure"));
                }
                Some(report)
            }
        }
    }
}

/// Run `<program> build <dir> -t <task> --ignore-meta --log json`.
///
/// The report line is captured; every other stdout line is forwarded to our
/// stdout. stderr is inherited. If `cancel_rx` fires, the child is killed and
/// [`ChildOutcome::Cancelled`] is returned.
pub async fn run_child_build(
    invoker: &SelfInvoker,
    build_dir: &Path,
    task: &str,
    force: bool,
    cancel_rx: Option<oneshot::Receiver<()>>,
) -> Result<ChildOutcome> {
    info!(task, "spawning child build");

    let mut cmd = invoker.build_command(build_dir, task, force);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning child build for task '{task}'"))?;

    let stdout = child
        .stdout
        .take()
        .context("child stdout was not captured")?;
    let reader_task = task.to_string();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut report = None;
        while let Ok(Some(line)) = lines.next_line().await {
            match decode_line(&line) {
                Some(Ok(r)) => report = Some(r),
                Some(Err(e)) => {
                    warn!(task = %reader_task, error = %e, "malformed report from child")
                }
                None => println!("{line}"),
            }
        }
        report
    });

    let cancelled = async move {
        match cancel_rx {
            Some(rx) => rx.await.is_ok(),
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for child build of '{task}'"))?;
            let report = reader.await.unwrap_or_default();
            debug!(task, success = status.success(), code = ?status.code(), "child build exited");
            Ok(ChildOutcome::Finished { success: status.success(), report })
        }

        true = cancelled => {
            info!(task, "killing child build");
            if let Err(e) = child.kill().await {
                warn!(task, error = %e, "failed to kill child build");
            }
            reader.abort();
            Ok(ChildOutcome::Cancelled)
        }
    }
}
