// src/config/validate.rs

use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::{BuildSection, DependenciesSection, RawConfigFile, WatchSection};
use crate::errors::{Result, YesbuildError};

/// A validated `yesbuild.toml`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub build: BuildSection,
    pub watch: WatchSection,
    pub dependencies: DependenciesSection,
    ignore: GlobSet,
}

impl ConfigFile {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    /// Compiled `[watch].ignore` globs.
    pub fn ignore_set(&self) -> &GlobSet {
        &self.ignore
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        let ignore = compile_globs(&raw.watch.ignore).unwrap_or_else(|_| GlobSet::empty());
        ConfigFile {
            build: raw.build,
            watch: raw.watch,
            dependencies: raw.dependencies,
            ignore,
        }
    }
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = YesbuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_build(&raw.build)?;
        validate_watch(&raw.watch)?;
        validate_dependencies(&raw.dependencies)?;
        let ignore = compile_globs(&raw.watch.ignore)?;
        Ok(ConfigFile {
            build: raw.build,
            watch: raw.watch,
            dependencies: raw.dependencies,
            ignore,
        })
    }
}

fn validate_build(build: &BuildSection) -> Result<()> {
    if build.dir.trim().is_empty() {
        return Err(YesbuildError::ConfigError(
            "[build].dir must not be empty".to_string(),
        ));
    }
    if build.default_task.trim().is_empty() {
        return Err(YesbuildError::ConfigError(
            "[build].default_task must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(watch: &WatchSection) -> Result<()> {
    if watch.debounce_ms == 0 {
        return Err(YesbuildError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_dependencies(deps: &DependenciesSection) -> Result<()> {
    if let Some(empty) = deps.lock_files.iter().position(|f| f.trim().is_empty()) {
        return Err(YesbuildError::ConfigError(format!(
            "[dependencies].lock_files[{empty}] must not be empty"
        )));
    }
    Ok(())
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            YesbuildError::ConfigError(format!("invalid [watch].ignore pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| YesbuildError::ConfigError(format!("invalid [watch].ignore patterns: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.build.dir, "build");
        assert_eq!(config.build.default_task, "default");
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert!(config.ignore_set().is_match("node_modules/react/index.js"));
        assert_eq!(config.dependencies.lock_files[0], "yarn.lock");
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse(
            r#"
            [build]
            dir = "out"

            [watch]
            debounce_ms = 50
            ignore = ["tmp/**"]
            "#,
        )
        .unwrap();
        assert_eq!(config.build.dir, "out");
        assert_eq!(config.build.default_task, "default");
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert!(!config.ignore_set().is_match("node_modules/x.js"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse("[watch]\ndebounce_ms = 0"),
            Err(YesbuildError::ConfigError(_))
        ));
        assert!(matches!(
            parse("[build]\ndir = \"\""),
            Err(YesbuildError::ConfigError(_))
        ));
        assert!(matches!(
            parse("[watch]\nignore = [\"src/[\"]"),
            Err(YesbuildError::ConfigError(msg)) if msg.contains("src/[")
        ));
        assert!(matches!(parse("[serve]\nport = 1"), Err(YesbuildError::TomlError(_))));
    }
}
