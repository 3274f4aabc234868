// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem with a logical clock.
///
/// Every write advances the clock by one second, so a file written later is
/// always strictly newer than one written earlier.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<Mutex<SystemTime>>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop `.` components so `./src/a.rs` and `src/a.rs` are the same key.
fn key(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn parent_key(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    Some(key(parent))
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            clock: Arc::new(Mutex::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000))),
        }
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap();
        *clock += Duration::from_secs(1);
        *clock
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let now = self.tick();
        let path = key(path.as_ref());
        let mut files = self.files.lock().unwrap();
        files.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified: now,
            },
        );
        self.link_into_parent(&mut files, &path);
    }

    /// Bump the mtime of an existing file to "now".
    pub fn touch(&self, path: impl AsRef<Path>) {
        let now = self.tick();
        let mut files = self.files.lock().unwrap();
        if let Some(MockEntry::File { modified, .. }) = files.get_mut(&key(path.as_ref())) {
            *modified = now;
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = key(path.as_ref());
        let mut files = self.files.lock().unwrap();
        files.remove(&path);
        if let (Some(parent), Some(name)) = (parent_key(&path), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = files.get_mut(&parent) {
                let name = name.to_string_lossy();
                children.retain(|c| *c != name);
            }
        }
    }

    fn link_into_parent(&self, files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let Some(parent) = parent_key(path) else {
            return;
        };
        if parent == path {
            return;
        }
        self.ensure_dir_entry(files, &parent);
        if let Some(MockEntry::Dir(children)) = files.get_mut(&parent) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !children.contains(&name.to_string()) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn ensure_dir_entry(&self, files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if !files.contains_key(path) {
            files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
            self.link_into_parent(files, path);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock().unwrap();
        match files.get(&key(path)) {
            Some(MockEntry::File { content, .. }) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let content = {
            let files = self.files.lock().unwrap();
            match files.get(&key(from)) {
                Some(MockEntry::File { content, .. }) => content.clone(),
                _ => return Err(anyhow!("File not found: {:?}", from)),
            }
        };
        let len = content.len() as u64;
        self.add_file(to, content);
        Ok(len)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        self.ensure_dir_entry(&mut files, &key(path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.contains_key(&key(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(&key(path)), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(&key(path)), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming relative paths are used in tests
        Ok(key(path))
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        let files = self.files.lock().unwrap();
        match files.get(&key(path)) {
            Some(MockEntry::File { modified, .. }) => Some(*modified),
            _ => None,
        }
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let files = self.files.lock().unwrap();
        match files.get(&key(path)) {
            Some(MockEntry::File { content, .. }) => Ok(content.len() as u64),
            _ => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        let dir = key(path);
        match files.get(&dir) {
            Some(MockEntry::Dir(children)) => {
                let base = if dir == Path::new(".") { PathBuf::new() } else { dir.clone() };
                Ok(children.iter().map(|name| base.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
