// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::RawConfigFile;
use crate::config::validate::ConfigFile;
use crate::errors::Result;
use crate::fs::FileSystem;

pub const DEFAULT_CONFIG_FILE: &str = "yesbuild.toml";

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs.read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load and validate a config file.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw = load_from_path(fs, path)?;
    ConfigFile::try_from(raw)
}

/// Load `path` if given, else `yesbuild.toml` when it exists, else defaults.
///
/// An explicitly named file must exist. Returns the file actually read, so
/// it can be recorded as an input of the build definition.
pub fn load_or_default(
    fs: &dyn FileSystem,
    path: Option<&Path>,
) -> Result<(ConfigFile, Option<PathBuf>)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = default_config_path();
            if !fs.is_file(&default) {
                debug!("no {DEFAULT_CONFIG_FILE}; using defaults");
                return Ok((ConfigFile::default(), None));
            }
            default
        }
    };

    let config = load_and_validate(fs, &path)?;
    debug!(path = %path.display(), "loaded config");
    Ok((config, Some(path)))
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
