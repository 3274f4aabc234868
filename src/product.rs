// src/product.rs

//! Files produced by actions.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A recorded output file, relative to the invoking working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub file: String,
    pub size: u64,
}

/// Accumulates the products of one task run.
#[derive(Debug, Clone)]
pub struct ProductBuilder {
    current_dir: PathBuf,
    outputs: Vec<Product>,
}

impl Default for ProductBuilder {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd)
    }
}

impl ProductBuilder {
    pub fn new(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: current_dir.into(),
            outputs: Vec::new(),
        }
    }

    pub fn push(&mut self, filename: impl AsRef<Path>, size: u64) {
        let file = relative_to(&self.current_dir, filename.as_ref());
        self.outputs.push(Product { file, size });
    }

    pub fn products(&self) -> &[Product] {
        &self.outputs
    }

    pub fn finalize(&self) -> Vec<Product> {
        self.outputs.clone()
    }
}

/// Express `path` relative to `base` with forward slashes.
///
/// Relative inputs are assumed to already be relative to `base`.
fn relative_to(base: &Path, path: &Path) -> String {
    if path.is_relative() {
        let cleaned: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        return cleaned.to_string_lossy().replace('\\', "/");
    }

    let base: Vec<Component<'_>> = base.components().collect();
    let target: Vec<Component<'_>> = path.components().collect();
    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component.as_os_str());
    }
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_products_are_made_relative() {
        let mut b = ProductBuilder::new("/work/site");
        b.push("/work/site/build/app/main.js", 120);
        b.push("/work/shared/logo.svg", 4);
        b.push("./build/app/main.css", 8);

        let files: Vec<_> = b.finalize().into_iter().map(|p| p.file).collect();
        assert_eq!(
            files,
            vec!["build/app/main.js", "../shared/logo.svg", "build/app/main.css"]
        );
    }
}
