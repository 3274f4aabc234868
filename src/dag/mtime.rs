// src/dag/mtime.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::fs::FileSystem;

/// Per-invocation memo of modification times.
///
/// `None` means the path could not be stat'ed and is treated as infinitely
/// new by callers.
#[derive(Debug)]
pub struct MtimeCache {
    fs: Arc<dyn FileSystem>,
    cache: HashMap<PathBuf, Option<SystemTime>>,
}

impl MtimeCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: impl AsRef<Path>) -> Option<SystemTime> {
        let path = path.as_ref();
        if let Some(hit) = self.cache.get(path) {
            return *hit;
        }
        let mtime = self.fs.modified(path);
        self.cache.insert(path.to_path_buf(), mtime);
        mtime
    }

    /// Latest mtime among `paths`.
    ///
    /// - `Ok(None)`: `paths` is empty.
    /// - `Err(path)`: some path is missing.
    pub fn latest<'a, I>(&mut self, paths: I) -> Result<Option<SystemTime>, &'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut latest: Option<SystemTime> = None;
        for path in paths {
            let Some(mtime) = self.get(path) else {
                return Err(path);
            };
            latest = Some(latest.map_or(mtime, |l| l.max(mtime)));
        }
        Ok(latest)
    }

    /// Forget everything; the next lookup hits the filesystem again.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn lookups_are_memoized_until_cleared() {
        let fs = MockFileSystem::new();
        fs.add_file("a.txt", "a");
        let mut cache = MtimeCache::new(Arc::new(fs.clone()));

        let first = cache.get("a.txt").unwrap();
        fs.touch("a.txt");
        assert_eq!(cache.get("a.txt"), Some(first));

        cache.clear();
        assert!(cache.get("a.txt").unwrap() > first);
    }

    #[test]
    fn latest_reports_missing_paths() {
        let fs = MockFileSystem::new();
        fs.add_file("a.txt", "a");
        fs.add_file("b.txt", "b");
        let mut cache = MtimeCache::new(Arc::new(fs.clone()));

        let b = fs.modified(Path::new("b.txt"));
        assert_eq!(cache.latest(["a.txt", "b.txt"]), Ok(b));
        assert_eq!(cache.latest(["a.txt", "gone.txt"]), Err("gone.txt"));
        assert_eq!(cache.latest(std::iter::empty()), Ok(None));
    }
}
