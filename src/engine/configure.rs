// src/engine/configure.rs

use std::path::Path;

use tracing::{error, info};

use crate::action::Session;
use crate::dag::BuildGraph;
use crate::errors::{Result, YesbuildError};

use super::registry::Project;
use super::runner::TaskRunner;

/// Run every task definition in registration order and persist the graph.
///
/// A failing task does not stop its siblings; its previous node stays on
/// disk. The meta file is only written when every task configured, so the
/// next build tries again.
pub async fn configure(
    project: &Project,
    session: &Session,
    graph: &mut BuildGraph,
    config_file: Option<&Path>,
) -> Result<()> {
    let build_dir = graph.build_dir().to_path_buf();
    info!(build_dir = %build_dir.display(), tasks = project.tasks().len(), "configuring project");
    session.fs.create_dir_all(&build_dir)?;

    let mut runner = TaskRunner::new(session, &build_dir);
    let mut failed = Vec::new();

    for def in project.tasks().iter() {
        match runner.configure_task(def).await {
            Ok(node) => graph.insert_task(def.name.clone(), node),
            Err(e) => {
                error!(task = %def.name, error = %e, "task failed to configure");
                session.report.lock().error(e.to_string());
                failed.push(def.name.clone());
            }
        }
    }

    graph.set_meta_deps(meta_dependencies(project, session, config_file));
    let written = graph.save_changed()?;
    info!(tasks = written.len(), "task nodes written");

    if !failed.is_empty() {
        return Err(YesbuildError::ConfigError(format!(
            "{} task(s) failed to configure: {}",
            failed.len(),
            failed.join(", ")
        )));
    }

    graph.save_meta()?;
    Ok(())
}

/// Inputs of the build definition itself: the program, the config file and
/// whatever the project declared.
fn meta_dependencies(
    project: &Project,
    session: &Session,
    config_file: Option<&Path>,
) -> Option<crate::dependency::Dependencies> {
    let mut deps = session.dependency_builder();

    if session.fs.is_file(&session.invoker.program) {
        deps.depend_file(&session.invoker.program);
    }
    if let Some(path) = config_file.filter(|p| session.fs.is_file(p)) {
        deps.depend_file(path);
    }
    for input in project.meta_inputs() {
        deps.depend_file(input);
    }

    deps.finalize()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::action::builtin::CopyFiles;
    use crate::action::SelfInvoker;
    use crate::dag::MtimeCache;
    use crate::engine::registry::TaskBody;
    use crate::fs::mock::MockFileSystem;
    use crate::fs::FileSystem;

    fn setup() -> (MockFileSystem, Session) {
        let fs = MockFileSystem::new();
        fs.add_file("static/index.html", "<html>");
        fs.add_file("yesbuild.toml", "");
        let session = Session::new(Arc::new(fs.clone()), SelfInvoker::new("yesbuild"))
            .with_current_dir(".");
        (fs, session)
    }

    #[tokio::test]
    async fn writes_nodes_and_meta() {
        let (fs, session) = setup();
        let mut project = Project::new();
        project.define("assets", |_| TaskBody::action(CopyFiles::glob("static/*")));
        project.depend_file("site.rs");
        fs.add_file("site.rs", "fn main() {}");

        let mut graph = BuildGraph::new("build", Arc::new(fs.clone()));
        configure(&project, &session, &mut graph, Some(Path::new("yesbuild.toml")))
            .await
            .unwrap();

        assert!(fs.is_file(Path::new("build/yesbuild.assets.json")));
        let meta = fs.read_to_string(Path::new("build/yesbuild.json")).unwrap();
        assert!(meta.contains("file://site.rs"));
        assert!(meta.contains("file://yesbuild.toml"));

        let mut fresh = BuildGraph::new("build", Arc::new(fs.clone()));
        let mut mtimes = MtimeCache::new(Arc::new(fs.clone()));
        assert_eq!(fresh.needs_reconfig(&mut mtimes).unwrap(), None);

        fs.touch("site.rs");
        let mut mtimes = MtimeCache::new(Arc::new(fs.clone()));
        assert_eq!(
            fresh.needs_reconfig(&mut mtimes).unwrap(),
            Some("site.rs".to_string())
        );
    }

    #[tokio::test]
    async fn failed_tasks_keep_their_previous_node_and_skip_meta() {
        let (fs, session) = setup();
        let mut project = Project::new();
        project.define("assets", |_| TaskBody::action(CopyFiles::glob("static/*")));
        project.define("broken", |_| {
            TaskBody::sequence(async { anyhow::bail!("entry point missing") })
        });

        let mut graph = BuildGraph::new("build", Arc::new(fs.clone()));
        let err = configure(&project, &session, &mut graph, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("broken"));
        assert!(fs.is_file(Path::new("build/yesbuild.assets.json")));
        assert!(!fs.exists(Path::new("build/yesbuild.broken.json")));
        assert!(!fs.exists(Path::new("build/yesbuild.json")));
        assert!(session.report.snapshot().has_errors());
    }
}
