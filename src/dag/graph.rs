// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::dag::mtime::MtimeCache;
use crate::dag::node::{
    self, FILE_VERSION, MetaFile, NamedTaskNode, TaskFile, TaskNode, meta_file_path,
    task_file_path,
};
use crate::dependency::{DepLiteral, Dependencies};
use crate::errors::{Result, YesbuildError};
use crate::fs::FileSystem;
use crate::types::TaskName;

/// The persisted build graph of one build directory.
///
/// Task nodes are loaded lazily, one file per task, the first time they are
/// asked for. Nodes touched through [`BuildGraph::insert_task`] or
/// [`BuildGraph::mark_changed`] are rewritten by [`BuildGraph::save_changed`];
/// everything else stays as it is on disk.
#[derive(Debug)]
pub struct BuildGraph {
    build_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    tasks: HashMap<TaskName, TaskNode>,
    changed: BTreeSet<TaskName>,
    meta_deps: Option<Dependencies>,
}

impl BuildGraph {
    pub fn new(build_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            build_dir: build_dir.into(),
            fs,
            tasks: HashMap::new(),
            changed: BTreeSet::new(),
            meta_deps: None,
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn exists_on_disk(&self) -> bool {
        self.fs.is_dir(&self.build_dir)
    }

    /// Return the node for `name`, reading its task file on first access.
    ///
    /// `Ok(None)` if neither memory nor disk knows the task.
    pub fn load_task(&mut self, name: &str) -> Result<Option<&TaskNode>> {
        if !self.tasks.contains_key(name) {
            let Some(node) = self.read_task_file(name)? else {
                return Ok(None);
            };
            self.tasks.insert(name.to_string(), node);
        }
        Ok(self.tasks.get(name))
    }

    /// Like [`BuildGraph::load_task`], but a missing task is an error.
    pub fn require_task(&mut self, name: &str) -> Result<&TaskNode> {
        self.load_task(name)?
            .ok_or_else(|| YesbuildError::TaskNotFound(name.to_string()))
    }

    /// Drop the in-memory copy and read the task file again.
    pub fn force_reload_task(&mut self, name: &str) -> Result<Option<&TaskNode>> {
        self.tasks.remove(name);
        self.changed.remove(name);
        self.load_task(name)
    }

    fn read_task_file(&self, name: &str) -> Result<Option<TaskNode>> {
        let path = task_file_path(&self.build_dir, name);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }
        let content = self.fs.read_to_string(&path)?;
        let file: TaskFile = serde_json::from_str(&content).map_err(|e| match e.classify() {
            // Well-formed JSON holding values we do not understand, such as
            // an unknown dependency literal.
            serde_json::error::Category::Data => {
                YesbuildError::ConfigError(format!("{}: {e}", path.display()))
            }
            _ => YesbuildError::from(e),
        })?;
        trace!(task = %name, path = %path.display(), "loaded task file");

        Ok(file
            .tasks
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.node))
    }

    /// Only already-loaded nodes; never touches the disk.
    pub fn task(&self, name: &str) -> Option<&TaskNode> {
        self.tasks.get(name)
    }

    pub fn task_mut(&mut self, name: &str) -> Option<&mut TaskNode> {
        self.tasks.get_mut(name)
    }

    /// Insert or replace a node and schedule it for saving.
    pub fn insert_task(&mut self, name: impl Into<TaskName>, node: TaskNode) {
        let name = name.into();
        self.changed.insert(name.clone());
        self.tasks.insert(name, node);
    }

    pub fn mark_changed(&mut self, name: &str) {
        if self.tasks.contains_key(name) {
            self.changed.insert(name.to_string());
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// All task names known on disk plus any loaded in memory, sorted.
    pub fn known_tasks(&self) -> Result<Vec<TaskName>> {
        let mut names: BTreeSet<TaskName> = self.tasks.keys().cloned().collect();

        if self.fs.is_dir(&self.build_dir) {
            for path in self.fs.read_dir(&self.build_dir)? {
                let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
                    continue;
                };
                if let Some(name) = node::task_name_from_file(file_name) {
                    names.insert(name.to_string());
                }
            }
        }

        Ok(names.into_iter().collect())
    }

    pub fn meta_deps(&self) -> Option<&Dependencies> {
        self.meta_deps.as_ref()
    }

    pub fn set_meta_deps(&mut self, deps: Option<Dependencies>) {
        self.meta_deps = deps;
    }

    fn load_meta(&mut self) -> Result<bool> {
        let path = meta_file_path(&self.build_dir);
        if !self.fs.is_file(&path) {
            return Ok(false);
        }
        let content = self.fs.read_to_string(&path)?;
        let meta: MetaFile = serde_json::from_str(&content)?;
        self.meta_deps = meta.deps;
        Ok(true)
    }

    /// Whether the build definition changed since the graph was written.
    ///
    /// Returns the offending filename: a meta input that is missing or newer
    /// than the meta file, or the meta file itself when it does not exist.
    pub fn needs_reconfig(&mut self, mtimes: &mut MtimeCache) -> Result<Option<String>> {
        let meta_path = meta_file_path(&self.build_dir);
        if !self.load_meta()? {
            return Ok(Some(meta_path.to_string_lossy().into_owned()));
        }
        let Some(meta_time) = mtimes.get(&meta_path) else {
            return Ok(Some(meta_path.to_string_lossy().into_owned()));
        };

        let files = match &self.meta_deps {
            None => return Ok(None),
            Some(Dependencies::Always) => {
                return Err(YesbuildError::ConfigError(
                    "Only file:// dependencies are supported for the meta file, got *".into(),
                ));
            }
            Some(Dependencies::List(list)) => list
                .iter()
                .map(|literal| match literal {
                    DepLiteral::File(path) => Ok(path.as_str()),
                    other => Err(YesbuildError::ConfigError(format!(
                        "Only file:// dependencies are supported for the meta file, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
        };

        for file in files {
            match mtimes.get(file) {
                None => return Ok(Some(file.to_string())),
                Some(mtime) if mtime > meta_time => return Ok(Some(file.to_string())),
                Some(_) => {}
            }
        }

        Ok(None)
    }

    /// Persist every changed node, then forget the change set.
    ///
    /// Returns the names written.
    pub fn save_changed(&mut self) -> Result<Vec<TaskName>> {
        let changed = std::mem::take(&mut self.changed);
        let mut written = Vec::with_capacity(changed.len());

        for name in changed {
            let Some(node) = self.tasks.get(&name) else {
                continue;
            };
            self.write_task(&name, node)?;
            written.push(name);
        }

        debug!(tasks = ?written, "saved changed task nodes");
        Ok(written)
    }

    fn write_task(&self, name: &str, node: &TaskNode) -> Result<()> {
        let file = TaskFile {
            version: FILE_VERSION.to_string(),
            tasks: vec![NamedTaskNode {
                name: name.to_string(),
                node: node.clone(),
            }],
        };
        let json = serde_json::to_string_pretty(&file)?;
        self.fs
            .write(&task_file_path(&self.build_dir, name), json.as_bytes())?;
        Ok(())
    }

    pub fn save_meta(&self) -> Result<()> {
        let meta = MetaFile {
            version: FILE_VERSION.to_string(),
            deps: self.meta_deps.clone(),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        self.fs
            .write(&meta_file_path(&self.build_dir), json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::node::ActionStore;
    use crate::fs::mock::MockFileSystem;

    fn graph(fs: &MockFileSystem) -> BuildGraph {
        BuildGraph::new("build", Arc::new(fs.clone()))
    }

    #[test]
    fn only_changed_nodes_are_written() {
        let fs = MockFileSystem::new();
        let mut g = graph(&fs);
        g.insert_task("a", TaskNode::default());
        g.insert_task("b", TaskNode::default());
        assert_eq!(g.save_changed().unwrap(), vec!["a", "b"]);

        let before = fs.modified(Path::new("build/yesbuild.a.json")).unwrap();
        g.mark_changed("b");
        assert_eq!(g.save_changed().unwrap(), vec!["b"]);
        assert_eq!(fs.modified(Path::new("build/yesbuild.a.json")), Some(before));
    }

    #[test]
    fn tasks_load_lazily_from_disk() {
        let fs = MockFileSystem::new();
        {
            let mut g = graph(&fs);
            g.insert_task(
                "copy",
                TaskNode {
                    actions: vec![ActionStore::new("internal:copy", serde_json::json!({"src": "a"}))],
                    deps: Some(Dependencies::sorted(vec![DepLiteral::file("a")])),
                    products: vec!["build/copy/a".into()],
                },
            );
            g.save_changed().unwrap();
        }

        let mut g = graph(&fs);
        assert!(g.task("copy").is_none());
        let node = g.require_task("copy").unwrap();
        assert_eq!(node.products, vec!["build/copy/a"]);
        assert!(matches!(
            g.require_task("nope"),
            Err(YesbuildError::TaskNotFound(_))
        ));
        assert_eq!(g.known_tasks().unwrap(), vec!["copy"]);
    }

    #[test]
    fn unknown_literal_on_disk_is_a_config_error() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "build/yesbuild.css.json",
            r#"{ "version": "1.0", "tasks": [{ "name": "css", "actions": [], "deps": ["http://x"], "products": [] }] }"#,
        );
        fs.add_file("build/yesbuild.js.json", "{ not json");

        let mut g = graph(&fs);
        match g.load_task("css") {
            Err(YesbuildError::ConfigError(msg)) => {
                assert!(msg.contains("yesbuild.css.json"), "{msg}");
                assert!(msg.contains("http://x"), "{msg}");
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
        assert!(matches!(g.load_task("js"), Err(YesbuildError::JsonError(_))));
    }

    #[test]
    fn missing_meta_needs_reconfig() {
        let fs = MockFileSystem::new();
        let mut g = graph(&fs);
        let mut mtimes = MtimeCache::new(Arc::new(fs.clone()));
        assert!(g.needs_reconfig(&mut mtimes).unwrap().is_some());
    }

    #[test]
    fn newer_meta_input_needs_reconfig() {
        let fs = MockFileSystem::new();
        fs.add_file("yesbuild.toml", "");
        let mut g = graph(&fs);
        g.set_meta_deps(Some(Dependencies::sorted(vec![DepLiteral::file("yesbuild.toml")])));
        g.save_meta().unwrap();

        let mut mtimes = MtimeCache::new(Arc::new(fs.clone()));
        assert_eq!(g.needs_reconfig(&mut mtimes).unwrap(), None);

        fs.touch("yesbuild.toml");
        let mut mtimes = MtimeCache::new(Arc::new(fs.clone()));
        assert_eq!(
            g.needs_reconfig(&mut mtimes).unwrap().as_deref(),
            Some("yesbuild.toml")
        );
    }

    #[test]
    fn meta_rejects_task_literals() {
        let fs = MockFileSystem::new();
        let mut g = graph(&fs);
        g.set_meta_deps(Some(Dependencies::sorted(vec![DepLiteral::task("a")])));
        g.save_meta().unwrap();

        let mut mtimes = MtimeCache::new(Arc::new(fs.clone()));
        assert!(matches!(
            g.needs_reconfig(&mut mtimes),
            Err(YesbuildError::ConfigError(_))
        ));
    }
}
