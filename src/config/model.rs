// src/config/model.rs

use serde::Deserialize;

use crate::dependency::ManagedDirPolicy;
use crate::watch::DEFAULT_DEBOUNCE;

/// `yesbuild.toml` as read from disk.
///
/// ```toml
/// [build]
/// dir = "build"
/// default_task = "default"
///
/// [watch]
/// debounce_ms = 300
/// ignore = ["node_modules/**", ".git/**"]
///
/// [dependencies]
/// managed_dir = "node_modules"
/// lock_files = ["yarn.lock", "pnpm-lock.yaml", "package-lock.json"]
/// ```
///
/// Every section is optional. Use [`ConfigFile`] (via `TryFrom`) for a
/// validated view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub dependencies: DependenciesSection,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Build directory used when the command line names none.
    #[serde(default = "default_build_dir")]
    pub dir: String,

    /// Entry task used when the command line names none.
    #[serde(default = "default_task")]
    pub default_task: String,
}

fn default_build_dir() -> String {
    "build".to_string()
}

fn default_task() -> String {
    "default".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            dir: default_build_dir(),
            default_task: default_task(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Globs (relative to the project root) whose changes are never
    /// forwarded. The build directory is always ignored.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_ignore() -> Vec<String> {
    vec!["node_modules/**".to_string(), ".git/**".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
        }
    }
}

/// `[dependencies]` section: how package-manager directories collapse to
/// their lock file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependenciesSection {
    #[serde(default = "default_managed_dir")]
    pub managed_dir: String,

    /// Checked in order; the first one that exists wins.
    #[serde(default = "default_lock_files")]
    pub lock_files: Vec<String>,
}

fn default_managed_dir() -> String {
    ManagedDirPolicy::default().managed_dir
}

fn default_lock_files() -> Vec<String> {
    ManagedDirPolicy::default().lock_files
}

impl Default for DependenciesSection {
    fn default() -> Self {
        Self {
            managed_dir: default_managed_dir(),
            lock_files: default_lock_files(),
        }
    }
}

impl From<&DependenciesSection> for ManagedDirPolicy {
    fn from(section: &DependenciesSection) -> Self {
        ManagedDirPolicy {
            managed_dir: section.managed_dir.clone(),
            lock_files: section.lock_files.clone(),
        }
    }
}
