// src/watch/index.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::dag::BuildGraph;
use crate::dependency::Dependencies;
use crate::errors::{Result, YesbuildError};
use crate::types::TaskName;

/// Reverse index: input file -> entry tasks that (transitively) read it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchIndex {
    files: BTreeMap<String, Vec<TaskName>>,
}

impl WatchIndex {
    /// Walk every entry task once. An entry that always rebuilds cannot be
    /// watched.
    pub fn build(graph: &mut BuildGraph, entries: &[TaskName]) -> Result<Self> {
        let mut files: BTreeMap<String, Vec<TaskName>> = BTreeMap::new();

        for entry in entries {
            reject_always(graph, entry)?;
            for file in graph.collect_all_file_deps(entry)? {
                let tasks = files.entry(file).or_default();
                if !tasks.contains(entry) {
                    tasks.push(entry.clone());
                }
            }
        }

        debug!(entries = ?entries, files = files.len(), "watch index built");
        Ok(Self { files })
    }

    /// Reject entries already recorded as always rebuilding, before any
    /// build runs. Entries not on disk yet are left to [`WatchIndex::build`].
    pub fn check_entries(graph: &mut BuildGraph, entries: &[TaskName]) -> Result<()> {
        for entry in entries {
            if matches!(graph.load_task(entry), Ok(Some(_))) {
                reject_always(graph, entry)?;
            }
        }
        Ok(())
    }

    /// Entry tasks affected by a change to `path`, in entry order.
    pub fn affected(&self, path: &str) -> &[TaskName] {
        let path = path.strip_prefix("./").unwrap_or(path);
        self.files.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        !self.affected(path).is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn reject_always(graph: &mut BuildGraph, entry: &str) -> Result<()> {
    let node = graph.require_task(entry)?;
    if matches!(node.deps, Some(Dependencies::Always)) {
        return Err(YesbuildError::WatchError(format!(
            "The dependencies of '{entry}' is '*', can not watch"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dag::TaskNode;
    use crate::dependency::DepLiteral;
    use crate::fs::mock::MockFileSystem;

    fn node(deps: Vec<DepLiteral>) -> TaskNode {
        TaskNode {
            deps: Some(Dependencies::sorted(deps)),
            ..TaskNode::default()
        }
    }

    fn graph() -> BuildGraph {
        let mut graph = BuildGraph::new("build", Arc::new(MockFileSystem::new()));
        graph.insert_task("css", node(vec![DepLiteral::file("src/site.css")]));
        graph.insert_task(
            "page",
            node(vec![DepLiteral::file("src/index.md"), DepLiteral::task("css")]),
        );
        graph.insert_task("docs", node(vec![DepLiteral::file("src/site.css")]));
        graph.insert_task(
            "serve",
            TaskNode {
                deps: Some(Dependencies::Always),
                ..TaskNode::default()
            },
        );
        graph
    }

    #[test]
    fn files_map_to_every_entry_reading_them() {
        let mut graph = graph();
        let index = WatchIndex::build(&mut graph, &["page".into(), "docs".into()]).unwrap();

        assert_eq!(index.affected("src/site.css"), ["page", "docs"]);
        assert_eq!(index.affected("./src/index.md"), ["page"]);
        assert!(index.affected("README.md").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn always_entries_are_rejected() {
        let mut graph = graph();
        let err = WatchIndex::build(&mut graph, &["page".into(), "serve".into()]).unwrap_err();
        assert!(matches!(err, YesbuildError::WatchError(msg) if msg.contains("'serve'")));
    }

    #[test]
    fn entry_check_only_rejects_known_always_tasks() {
        let mut graph = graph();
        WatchIndex::check_entries(&mut graph, &["page".into(), "unconfigured".into()]).unwrap();

        let err = WatchIndex::check_entries(&mut graph, &["serve".into()]).unwrap_err();
        assert!(matches!(err, YesbuildError::WatchError(_)));
    }
}
