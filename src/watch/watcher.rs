// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::GlobSet;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::WatchEvent;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops file
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Which changed paths are forwarded.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    /// Build directory, relative to the root.
    pub build_dir: String,
    pub ignore: GlobSet,
}

impl WatchFilter {
    /// `path` is relative to the watch root.
    pub fn accepts(&self, path: &str) -> bool {
        let build_dir = self.build_dir.trim_start_matches("./").trim_end_matches('/');
        if !build_dir.is_empty() && (path == build_dir || path.starts_with(&format!("{build_dir}/"))) {
            return false;
        }
        !self.ignore.is_match(path)
    }
}

/// Watch `root` recursively and send [`WatchEvent::FileChanged`] with
/// root-relative paths for every accepted change.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    filter: WatchFilter,
    events_tx: mpsc::Sender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // notify calls back on its own thread.
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = raw_tx.send(event) {
                    eprintln!("yesbuild: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("yesbuild: file watch error: {err}"),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = raw_rx.recv().await {
            if !is_content_change(&event.kind) {
                trace!(kind = ?event.kind, "ignoring notify event");
                continue;
            }
            for path in &event.paths {
                let Some(rel) = relative_str(&root, path) else {
                    continue;
                };
                if !filter.accepts(&rel) {
                    continue;
                }
                debug!(path = %rel, "file changed");
                if events_tx.send(WatchEvent::FileChanged { path: rel }).await.is_err() {
                    debug!("watch runtime gone; stopping watcher loop");
                    return;
                }
            }
        }
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

/// Express `path` relative to `root` with forward slashes.
///
/// Falls back to canonical paths (symlinked temp dirs on macOS). A removed
/// file cannot be canonicalized, so its parent is used instead.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let canonical = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    let root = root.canonicalize().ok()?;
    canonical
        .strip_prefix(&root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use globset::{Glob, GlobSetBuilder};

    use super::*;

    fn filter() -> WatchFilter {
        let mut ignore = GlobSetBuilder::new();
        ignore.add(Glob::new("node_modules/**").unwrap());
        ignore.add(Glob::new(".git/**").unwrap());
        WatchFilter {
            build_dir: "./build".into(),
            ignore: ignore.build().unwrap(),
        }
    }

    #[test]
    fn build_dir_and_ignored_paths_are_dropped() {
        let filter = filter();
        assert!(filter.accepts("src/index.md"));
        assert!(filter.accepts("builder.rs"));
        assert!(!filter.accepts("build/yesbuild.site.json"));
        assert!(!filter.accepts("node_modules/left-pad/index.js"));
        assert!(!filter.accepts(".git/HEAD"));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/work/site");
        assert_eq!(
            relative_str(root, Path::new("/work/site/src/index.md")).as_deref(),
            Some("src/index.md")
        );
    }

    #[test]
    fn removed_files_resolve_through_their_parent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("src")).unwrap();
        let canonical_root = root.canonicalize().unwrap();

        let gone = canonical_root.join("src").join("gone.md");
        assert_eq!(relative_str(&root, &gone).as_deref(), Some("src/gone.md"));
    }
}
