// src/report.rs

//! The structured result of one invocation.
//!
//! A readable invocation prints a summary to stdout at the end; a JSON
//! invocation (a forked child) emits the report as a single message for its
//! parent, which merges it into its own.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::product::Product;

const MAX_PRINTED_OUTPUTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub outputs: Vec<Product>,
    /// Wall time in milliseconds.
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub task_count: usize,
    /// Task files rewritten because their recorded state changed.
    #[serde(default)]
    pub updated_files: Vec<String>,
    #[serde(default)]
    pub errors: Vec<ErrorLog>,
    #[serde(skip, default = "Instant::now")]
    started: Instant,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            delta: 0.0,
            task_count: 0,
            updated_files: Vec::new(),
            errors: Vec::new(),
            started: Instant::now(),
        }
    }
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_outputs(&mut self, outputs: impl IntoIterator<Item = Product>) {
        self.outputs.extend(outputs);
    }

    pub fn plus_task_counter(&mut self) {
        self.task_count += 1;
    }

    pub fn add_updated_file(&mut self, path: impl Into<String>) {
        self.updated_files.push(path.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ErrorLog {
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Fold a child's report into this one. `delta` is not summed; children
    /// run concurrently with the parent.
    pub fn merge(&mut self, other: Report) {
        self.outputs.extend(other.outputs);
        self.task_count += other.task_count;
        self.updated_files.extend(other.updated_files);
        self.errors.extend(other.errors);
    }

    /// Stamp the elapsed time.
    pub fn finish(&mut self) {
        self.delta = self.started.elapsed().as_secs_f64() * 1000.0;
    }

    /// Human summary.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.errors.is_empty() {
            for err in &self.errors {
                let _ = writeln!(out, "{}", err.message);
            }
            return out;
        }

        if !self.updated_files.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "These task files have changed due to the dependencies:");
            for f in &self.updated_files {
                let _ = writeln!(out, " - {f}");
            }
        }

        let _ = writeln!(out);
        if self.outputs.is_empty() {
            let _ = writeln!(out, "Everything is up to date.");
            let _ = writeln!(out);
        } else {
            let mut outputs: Vec<&Product> = self.outputs.iter().collect();
            outputs.sort_by_key(|p| p.size);
            let width = outputs.iter().map(|p| p.file.len()).max().unwrap_or(0) + 4;

            let _ = writeln!(out, "{} files generated.", outputs.len());
            for product in outputs.iter().take(MAX_PRINTED_OUTPUTS) {
                let _ = writeln!(
                    out,
                    "{:<width$}{}",
                    product.file,
                    friendly_size(product.size)
                );
            }
            if outputs.len() > MAX_PRINTED_OUTPUTS {
                let _ = writeln!(out, "...");
                let _ = writeln!(
                    out,
                    "{} files are hidden.",
                    outputs.len() - MAX_PRINTED_OUTPUTS
                );
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(
            out,
            "Totally {} tasks executed in {}ms.",
            self.task_count,
            self.delta.round()
        );
        out
    }
}

pub fn friendly_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    let one_decimal = |n: f64| (n * 10.0).round() / 10.0;

    if b < KB {
        format!("{bytes}bytes")
    } else if b < KB * KB {
        format!("{}kb", one_decimal(b / KB))
    } else if b < KB * KB * KB {
        format!("{}mb", one_decimal(b / (KB * KB)))
    } else {
        format!("{}gb", one_decimal(b / (KB * KB * KB)))
    }
}

/// Shared handle to the invocation's report.
#[derive(Debug, Clone, Default)]
pub struct ReportHandle(Arc<Mutex<Report>>);

impl ReportHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the report. A poisoned lock still yields the data; a panic in
    /// one task must not hide the errors already recorded.
    pub fn lock(&self) -> MutexGuard<'_, Report> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Report {
        self.lock().clone()
    }
}
