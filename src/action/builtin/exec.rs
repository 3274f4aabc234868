// src/action/builtin/exec.rs

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use crate::action::{ActionFuture, ActionKind, ExecutionContext};
use crate::types::Stage;

/// Runs an external program at build time.
///
/// With `detach` set, the program is not run during the build; it is started
/// after the whole invocation succeeded (a dev server, a preview).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exec {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub detach: bool,
}

impl Exec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            detach: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn detached(mut self) -> Self {
        self.detach = true;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }
}

async fn run_to_completion(mut cmd: Command, program: &str) -> Result<()> {
    let status = cmd
        .status()
        .await
        .with_context(|| format!("starting {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

impl ActionKind for Exec {
    const NAME: &'static str = "internal:exec";

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            ctx.deps.depend_always();
            if ctx.stage == Stage::Configure {
                return Ok(());
            }

            if self.detach {
                let cmd = self.command();
                let program = self.program.clone();
                info!(program = %program, "deferring until the build finishes");
                ctx.hooks
                    .register(move || async move { run_to_completion(cmd, &program).await });
                return Ok(());
            }

            info!(program = %self.program, args = ?self.args, "running");
            run_to_completion(self.command(), &self.program).await
        })
    }
}
