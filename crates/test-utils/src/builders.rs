#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use yesbuild::action::{SelfInvoker, Session};
use yesbuild::dag::{ActionStore, BuildGraph, TaskNode};
use yesbuild::dependency::{DepLiteral, Dependencies};
use yesbuild::engine::BuildOptions;
use yesbuild::fs::FileSystem;
use yesbuild::fs::mock::MockFileSystem;
use yesbuild::report::{Report, ReportHandle};

pub const BUILD_DIR: &str = "build";

/// An in-memory project: a mock filesystem and a session over it.
///
/// The session's child program does not exist, so anything that forks a
/// child build fails instead of running.
pub struct MockWorkspace {
    pub fs: Arc<MockFileSystem>,
    pub session: Session,
    pub build_dir: PathBuf,
}

impl MockWorkspace {
    pub fn new() -> Self {
        let fs = Arc::new(MockFileSystem::new());
        let session = Session::new(
            Arc::clone(&fs) as Arc<dyn FileSystem>,
            SelfInvoker::new("/nonexistent/yesbuild-test"),
        )
        .with_current_dir(".");
        Self {
            fs,
            session,
            build_dir: PathBuf::from(BUILD_DIR),
        }
    }

    pub fn file(&self, path: impl AsRef<Path>, content: &str) -> &Self {
        self.fs.add_file(path, content);
        self
    }

    pub fn touch(&self, path: impl AsRef<Path>) {
        self.fs.touch(path);
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<String> {
        self.fs.read_to_string(path.as_ref()).ok()
    }

    /// A fresh graph over the build directory; nothing is loaded yet.
    pub fn graph(&self) -> BuildGraph {
        BuildGraph::new(&self.build_dir, Arc::clone(&self.fs) as Arc<dyn FileSystem>)
    }

    /// Load `task` as it is currently written to disk.
    pub fn task_node(&self, task: &str) -> Option<TaskNode> {
        let mut graph = self.graph();
        graph.load_task(task).ok().flatten().cloned()
    }

    pub fn options(&self, task: &str) -> BuildOptions {
        BuildOptions::new(&self.build_dir, task)
    }

    /// Take the report accumulated so far and start a new one.
    pub fn take_report(&mut self) -> Report {
        let report = self.session.report.snapshot();
        self.session.report = ReportHandle::new();
        report
    }

    pub fn report(&self) -> Report {
        self.session.report.snapshot()
    }
}

impl Default for MockWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskNode` values written straight into a graph.
#[derive(Debug, Default)]
pub struct TaskNodeBuilder {
    actions: Vec<ActionStore>,
    literals: Vec<DepLiteral>,
    always: bool,
    products: Vec<String>,
}

impl TaskNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, name: &str, props: serde_json::Value) -> Self {
        self.actions.push(ActionStore::new(name, props));
        self
    }

    pub fn file(mut self, path: &str) -> Self {
        self.literals.push(DepLiteral::file(path));
        self
    }

    pub fn task(mut self, name: &str) -> Self {
        self.literals.push(DepLiteral::task(name));
        self
    }

    pub fn always(mut self) -> Self {
        self.always = true;
        self
    }

    pub fn product(mut self, path: &str) -> Self {
        self.products.push(path.to_string());
        self
    }

    pub fn build(self) -> TaskNode {
        let deps = if self.always {
            Some(Dependencies::Always)
        } else if self.literals.is_empty() {
            None
        } else {
            Some(Dependencies::sorted(self.literals))
        };
        TaskNode {
            actions: self.actions,
            deps,
            products: self.products,
        }
    }
}

/// Write `nodes` into the graph's build directory, as a configure pass would.
pub fn write_nodes(graph: &mut BuildGraph, nodes: Vec<(&str, TaskNode)>) {
    for (name, node) in nodes {
        graph.insert_task(name, node);
    }
    graph.save_changed().expect("save task nodes");
}
