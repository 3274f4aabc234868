// src/action/builtin/copy.rs

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::action::{ActionFuture, ActionKind, ExecutionContext};
use crate::fs::FileSystem;
use crate::types::Stage;

/// A glob, or an explicit list of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CopySource {
    Glob(String),
    Files(Vec<String>),
}

/// Copies files into the build directory.
///
/// Configuration copies every source. A build replay copies only the sources
/// that changed (or everything when the run was forced), and re-expands the
/// glob so new files become dependencies and products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFiles {
    pub src: CopySource,
    /// Destination directory; the task directory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Sources keep their path relative to this directory; the working
    /// directory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<String>,
}

impl CopyFiles {
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self {
            src: CopySource::Glob(pattern.into()),
            dest: None,
            relative: None,
        }
    }

    pub fn files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            src: CopySource::Files(files.into_iter().map(Into::into).collect()),
            dest: None,
            relative: None,
        }
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn relative(mut self, dir: impl Into<String>) -> Self {
        self.relative = Some(dir.into());
        self
    }
}

impl ActionKind for CopyFiles {
    const NAME: &'static str = "internal:copy";

    fn execute<'a>(&'a self, ctx: &'a mut ExecutionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            let sources = match &self.src {
                CopySource::Glob(pattern) => expand_glob(ctx.fs.as_ref(), pattern)?,
                CopySource::Files(files) => files.clone(),
            };
            for source in &sources {
                ctx.deps.depend_file(source);
            }

            let copy_all = ctx.stage == Stage::Configure || ctx.changed_files.is_none();
            let changed = ctx.changed_files.as_deref().unwrap_or_default();

            let dest_dir = self
                .dest
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| ctx.task_dir.clone());
            ctx.fs.create_dir_all(&dest_dir)?;

            for source in &sources {
                let source_path = Path::new(source);
                if !ctx.fs.is_file(source_path) {
                    trace!(source = %source, "skipping non-file source");
                    continue;
                }

                let relative = relative_source(source_path, self.relative.as_deref());
                let dest = dest_dir.join(relative);
                let size = if copy_all || changed.contains(source) || !ctx.fs.is_file(&dest) {
                    let size = ctx
                        .fs
                        .copy(source_path, &dest)
                        .with_context(|| format!("copying {source}"))?;
                    debug!(from = %source, to = %dest.display(), size, "copied");
                    size
                } else {
                    ctx.fs.size(&dest)?
                };
                ctx.products.push(&dest, size);
            }

            Ok(())
        })
    }
}

/// Path of `source` below the destination directory. Absolute sources lose
/// their root so they never escape it.
fn relative_source(source: &Path, relative: Option<&str>) -> PathBuf {
    let source = strip_cur_dir(source);
    let source = match relative {
        Some(base) => source
            .strip_prefix(strip_cur_dir(Path::new(base)))
            .unwrap_or(source),
        None => source,
    };
    source
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

fn strip_cur_dir(path: &Path) -> &Path {
    let mut components = path.components();
    while let Some(Component::CurDir) = components.clone().next() {
        components.next();
    }
    components.as_path()
}

/// Expand `pattern` against the filesystem, relative to the working
/// directory. Results are sorted, with forward slashes.
fn expand_glob(fs: &dyn FileSystem, pattern: &str) -> Result<Vec<String>> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob {pattern:?}"))?
        .compile_matcher();

    let base = literal_prefix(pattern);
    let mut matches = Vec::new();

    if fs.is_file(&base) {
        let s = to_slash(&base);
        if matcher.is_match(&s) {
            matches.push(s);
        }
    } else if fs.is_dir(&base) {
        walk(fs, &base, &matcher, &mut matches)?;
    }

    matches.sort();
    Ok(matches)
}

/// Leading components without glob metacharacters.
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(part) = component
            && part.to_string_lossy().contains(['*', '?', '[', '{'])
        {
            break;
        }
        base.push(component);
    }
    if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    }
}

fn walk(fs: &dyn FileSystem, dir: &Path, matcher: &GlobMatcher, out: &mut Vec<String>) -> Result<()> {
    for entry in fs.read_dir(dir)? {
        let entry = strip_cur_dir(&entry).to_path_buf();
        if fs.is_dir(&entry) {
            walk(fs, &entry, matcher, out)?;
        } else {
            let s = to_slash(&entry);
            if matcher.is_match(&s) {
                out.push(s);
            }
        }
    }
    Ok(())
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
