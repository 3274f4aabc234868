// src/config/mod.rs

//! Configuration loading and validation for yesbuild.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate values and compile ignore globs (`validate.rs`).
//!
//! The file is optional; every value has a default.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, load_or_default};
pub use model::{BuildSection, DependenciesSection, RawConfigFile, WatchSection};
pub use validate::ConfigFile;
