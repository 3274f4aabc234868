// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
///
/// Everything the scheduler and the built-in actions touch on disk goes
/// through this trait so staleness can be tested with controlled mtimes.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write `contents` to `path`, creating parent directories.
    ///
    /// Implementations must not leave a half-written file at `path`.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Copy a regular file, creating parent directories of `to`.
    /// Returns the number of bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Modification time, or `None` if nothing exists at `path` or it cannot
    /// be stat'ed.
    fn modified(&self, path: &Path) -> Option<SystemTime>;

    /// Size in bytes of a regular file.
    fn size(&self, path: &Path) -> Result<u64>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
        }

        // Write-then-rename so readers never observe a truncated file.
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut file =
                fs::File::create(&tmp).with_context(|| format!("creating file {:?}", tmp))?;
            file.write_all(contents)
                .with_context(|| format!("writing to file {:?}", tmp))?;
        }
        fs::rename(&tmp, path).with_context(|| format!("renaming {:?} to {:?}", tmp, path))?;
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        if let Some(parent) = to.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::copy(from, to).with_context(|| format!("copying {:?} to {:?}", from, to))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        match fs::metadata(path) {
            Ok(meta) => meta.modified().ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(?path, error = %e, "stat failed; treating as missing");
                None
            }
        }
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path).with_context(|| format!("stat {:?}", path))?;
        Ok(meta.len())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}
