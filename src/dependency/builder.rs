// src/dependency/builder.rs

use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::dependency::literal::{DepLiteral, Dependencies};
use crate::fs::{FileSystem, RealFileSystem};

/// Where third-party packages live and which lock files stand in for them.
///
/// Depending on thousands of files under the managed directory is replaced by
/// a single dependency on the first lock file that exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDirPolicy {
    pub managed_dir: String,
    pub lock_files: Vec<String>,
}

impl Default for ManagedDirPolicy {
    fn default() -> Self {
        Self {
            managed_dir: "node_modules".to_string(),
            lock_files: vec![
                "yarn.lock".to_string(),
                "pnpm-lock.yaml".to_string(),
                "package-lock.json".to_string(),
            ],
        }
    }
}

impl ManagedDirPolicy {
    fn is_managed(&self, path: &str) -> bool {
        !self.managed_dir.is_empty() && Path::new(path).starts_with(&self.managed_dir)
    }
}

/// Accumulates the dependencies reported by the actions of one task run.
#[derive(Debug, Clone)]
pub struct DependencyBuilder {
    deps: Option<Dependencies>,
    depends_on_lock: bool,
    policy: Arc<ManagedDirPolicy>,
    fs: Arc<dyn FileSystem>,
}

impl Default for DependencyBuilder {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem), Arc::new(ManagedDirPolicy::default()))
    }
}

impl DependencyBuilder {
    pub fn new(fs: Arc<dyn FileSystem>, policy: Arc<ManagedDirPolicy>) -> Self {
        Self {
            deps: None,
            depends_on_lock: false,
            policy,
            fs,
        }
    }

    /// A fresh builder sharing this builder's filesystem and policy.
    pub fn fresh(&self) -> Self {
        Self::new(Arc::clone(&self.fs), Arc::clone(&self.policy))
    }

    pub fn add_dep(&mut self, literal: DepLiteral) {
        match (&mut self.deps, literal) {
            (Some(Dependencies::Always), _) => {}
            (slot, DepLiteral::Always) => *slot = Some(Dependencies::Always),
            (Some(Dependencies::List(list)), literal) => list.push(literal),
            (slot @ None, literal) => *slot = Some(Dependencies::List(vec![literal])),
        }
    }

    /// Add every literal of a recorded set.
    pub fn add_deps(&mut self, deps: Option<&Dependencies>) {
        match deps {
            None => {}
            Some(Dependencies::Always) => self.add_dep(DepLiteral::Always),
            Some(Dependencies::List(list)) => {
                for literal in list {
                    self.add_dep(literal.clone());
                }
            }
        }
    }

    pub fn depend_always(&mut self) {
        self.add_dep(DepLiteral::Always);
    }

    pub fn depend_file(&mut self, path: impl AsRef<Path>) {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        let path = raw.strip_prefix("./").unwrap_or(&raw);

        if self.policy.is_managed(path) && self.try_depend_lock() {
            return;
        }
        self.add_dep(DepLiteral::file(path));
    }

    fn try_depend_lock(&mut self) -> bool {
        if self.depends_on_lock {
            return true;
        }

        let policy = Arc::clone(&self.policy);
        for name in &policy.lock_files {
            if self.fs.exists(Path::new(name)) {
                trace!(lock = %name, "collapsing managed dependency into lock file");
                self.add_dep(DepLiteral::file(name.as_str()));
                self.depends_on_lock = true;
                return true;
            }
        }

        false
    }

    pub fn depend_task(&mut self, name: impl Into<String>) {
        self.add_dep(DepLiteral::task(name));
    }

    /// Snapshot of what has been recorded so far, unsorted.
    pub fn current(&self) -> Option<&Dependencies> {
        self.deps.as_ref()
    }

    /// Sorted, de-duplicated set (or `Always` / undefined).
    pub fn finalize(&self) -> Option<Dependencies> {
        match &self.deps {
            Some(Dependencies::List(list)) => Some(Dependencies::sorted(list.clone())),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn builder_with(fs: &MockFileSystem) -> DependencyBuilder {
        DependencyBuilder::new(Arc::new(fs.clone()), Arc::new(ManagedDirPolicy::default()))
    }

    #[test]
    fn finalize_sorts_and_dedups() {
        let mut b = builder_with(&MockFileSystem::new());
        b.depend_task("assets");
        b.depend_file("./src/b.ts");
        b.depend_file("src/a.ts");
        b.depend_file("src/b.ts");

        let deps = b.finalize().unwrap();
        assert_eq!(
            deps.literals(),
            &[
                DepLiteral::file("src/a.ts"),
                DepLiteral::file("src/b.ts"),
                DepLiteral::task("assets"),
            ]
        );
    }

    #[test]
    fn always_absorbs_later_adds() {
        let mut b = builder_with(&MockFileSystem::new());
        b.depend_file("src/a.ts");
        b.depend_always();
        b.depend_file("src/b.ts");
        assert_eq!(b.finalize(), Some(Dependencies::Always));
    }

    #[test]
    fn nothing_added_is_undefined() {
        let b = builder_with(&MockFileSystem::new());
        assert_eq!(b.finalize(), None);
    }

    #[test]
    fn managed_files_collapse_into_one_lock_dependency() {
        let fs = MockFileSystem::new();
        fs.add_file("pnpm-lock.yaml", "lockfileVersion: 6");
        let mut b = builder_with(&fs);

        b.depend_file("node_modules/react/index.js");
        b.depend_file("node_modules/react-dom/index.js");
        b.depend_file("src/app.tsx");

        let deps = b.finalize().unwrap();
        assert_eq!(
            deps.literals(),
            &[DepLiteral::file("pnpm-lock.yaml"), DepLiteral::file("src/app.tsx")]
        );
    }

    #[test]
    fn managed_dir_matches_whole_components() {
        let fs = MockFileSystem::new();
        fs.add_file("yarn.lock", "# yarn");
        let mut b = builder_with(&fs);

        b.depend_file("node_modules_cache/react.tgz");
        b.depend_file("./node_modules/react/index.js");

        assert_eq!(
            b.finalize().unwrap().literals(),
            &[
                DepLiteral::file("node_modules_cache/react.tgz"),
                DepLiteral::file("yarn.lock"),
            ]
        );
    }

    #[test]
    fn managed_files_fall_through_without_lock() {
        let mut b = builder_with(&MockFileSystem::new());
        b.depend_file("node_modules/react/index.js");
        assert_eq!(
            b.finalize().unwrap().literals(),
            &[DepLiteral::file("node_modules/react/index.js")]
        );
    }
}
