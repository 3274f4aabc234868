// src/action/context.rs

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::process::Command;
use tracing::debug;

use crate::dependency::{DependencyBuilder, ManagedDirPolicy};
use crate::fs::{FileSystem, RealFileSystem};
use crate::product::ProductBuilder;
use crate::report::ReportHandle;
use crate::types::Stage;

/// A deferred side effect that runs once the whole invocation succeeded.
pub type CompletionHook =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Hooks registered by actions during a run.
#[derive(Clone, Default)]
pub struct CompletionHooks(Arc<Mutex<Vec<CompletionHook>>>);

impl fmt::Debug for CompletionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHooks")
            .field("len", &self.len())
            .finish()
    }
}

impl CompletionHooks {
    pub fn register<F, Fut>(&self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook: CompletionHook = Box::new(move || Box::pin(hook()));
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(hook);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered hook in registration order, stopping at the
    /// first failure.
    pub async fn run_all(&self) -> anyhow::Result<()> {
        let hooks = std::mem::take(&mut *self.0.lock().unwrap_or_else(|p| p.into_inner()));
        debug!(count = hooks.len(), "running completion hooks");
        for hook in hooks {
            hook().await?;
        }
        Ok(())
    }
}

/// How to re-execute this program for a child build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfInvoker {
    pub program: PathBuf,
    /// Arguments placed before the subcommand, e.g. `--config <path>`.
    pub base_args: Vec<String>,
}

impl SelfInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    pub fn current() -> anyhow::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_base_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.base_args.extend(args);
        self
    }

    /// `<program> [base args] build <dir> -t <task> --ignore-meta --log json [--force]`
    pub fn build_args(&self, build_dir: &Path, task: &str, force: bool) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "build".to_string(),
            build_dir.to_string_lossy().into_owned(),
            "-t".to_string(),
            task.to_string(),
            "--ignore-meta".to_string(),
            "--log".to_string(),
            "json".to_string(),
        ]);
        if force {
            args.push("--force".to_string());
        }
        args
    }

    pub fn build_command(&self, build_dir: &Path, task: &str, force: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.build_args(build_dir, task, force));
        cmd
    }
}

/// Everything shared by the actions of one invocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub fs: Arc<dyn FileSystem>,
    pub policy: Arc<ManagedDirPolicy>,
    pub invoker: Arc<SelfInvoker>,
    pub report: ReportHandle,
    pub hooks: CompletionHooks,
    pub current_dir: PathBuf,
}

impl Session {
    pub fn new(fs: Arc<dyn FileSystem>, invoker: SelfInvoker) -> Self {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            fs,
            policy: Arc::new(ManagedDirPolicy::default()),
            invoker: Arc::new(invoker),
            report: ReportHandle::new(),
            hooks: CompletionHooks::default(),
            current_dir,
        }
    }

    /// Real filesystem, this executable as the child program.
    pub fn current() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(RealFileSystem), SelfInvoker::current()?))
    }

    pub fn with_policy(mut self, policy: ManagedDirPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = dir.into();
        self
    }

    pub fn dependency_builder(&self) -> DependencyBuilder {
        DependencyBuilder::new(Arc::clone(&self.fs), Arc::clone(&self.policy))
    }
}

/// What an action sees while it executes.
///
/// One context is shared by all actions of a task run, so dependencies and
/// products accumulate across the sequence.
#[derive(Debug)]
pub struct ExecutionContext {
    pub stage: Stage,
    pub deps: DependencyBuilder,
    pub products: ProductBuilder,
    pub build_dir: PathBuf,
    pub task_dir: PathBuf,
    pub force_update: bool,
    /// Inputs that made the current build necessary, when known.
    pub changed_files: Option<Vec<String>>,
    pub report: ReportHandle,
    pub hooks: CompletionHooks,
    pub invoker: Arc<SelfInvoker>,
    pub fs: Arc<dyn FileSystem>,
}

impl ExecutionContext {
    pub fn new(session: &Session, stage: Stage, build_dir: &Path, task: &str) -> Self {
        Self {
            stage,
            deps: session.dependency_builder(),
            products: ProductBuilder::new(&session.current_dir),
            build_dir: build_dir.to_path_buf(),
            task_dir: build_dir.join(task),
            force_update: false,
            changed_files: None,
            report: session.report.clone(),
            hooks: session.hooks.clone(),
            invoker: Arc::clone(&session.invoker),
            fs: Arc::clone(&session.fs),
        }
    }

    pub fn with_force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    pub fn with_changed_files(mut self, files: Option<Vec<String>>) -> Self {
        self.changed_files = files;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_build_arguments() {
        let invoker = SelfInvoker::new("/bin/site").with_base_args(["--config".into(), "ci.toml".into()]);
        assert_eq!(
            invoker.build_args(Path::new("build"), "css", true),
            vec![
                "--config", "ci.toml", "build", "build", "-t", "css", "--ignore-meta", "--log",
                "json", "--force"
            ]
        );
    }

    #[tokio::test]
    async fn hooks_run_once_in_order() {
        let hooks = CompletionHooks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            hooks.register(move || async move {
                seen.lock().unwrap().push(i);
                Ok(())
            });
        }

        hooks.run_all().await.unwrap();
        hooks.run_all().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert!(hooks.is_empty());
    }
}
