// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The same arguments are used by child builds: a parent re-executes this
//! program as `build <dir> -t <task> --ignore-meta --log json`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::LogMode;

/// Command-line arguments of a yesbuild program.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "yesbuild",
    version,
    about = "Incremental build orchestrator.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `yesbuild.toml` in the current working directory, if present.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `YESBUILD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every task definition and write the build graph.
    Config {
        /// Build directory to write.
        #[arg(short = 'o', long = "out", value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Rebuild what is stale below a task.
    Build(BuildArgs),

    /// Build, then rebuild entry tasks whenever their inputs change.
    Watch {
        /// Entry tasks; the configured default task when empty.
        tasks: Vec<String>,

        #[arg(short = 'd', long = "dir", value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Build directory.
    #[arg(value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Build directory; takes precedence over the positional form.
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Entry task, or `*` for every known task.
    #[arg(short = 't', long = "task", value_name = "NAME")]
    pub task: Option<String>,

    /// Rebuild the entry and everything below it without checking mtimes.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Do not reconfigure when the build definition changed.
    #[arg(long)]
    pub ignore_meta: bool,

    /// Output format of the final report.
    #[arg(long, value_name = "FORMAT", default_value = "readable")]
    pub log: LogMode,
}

impl BuildArgs {
    pub fn build_dir(&self) -> Option<PathBuf> {
        self.dir.clone().or_else(|| self.path.clone())
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_build_arguments_parse() {
        let args = CliArgs::try_parse_from([
            "site", "--config", "ci.toml", "build", "out", "-t", "css", "--ignore-meta", "--log",
            "json", "--force",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("ci.toml")));
        let Command::Build(build) = args.command else {
            panic!("expected build");
        };
        assert_eq!(build.build_dir(), Some(PathBuf::from("out")));
        assert_eq!(build.task.as_deref(), Some("css"));
        assert!(build.force && build.ignore_meta);
        assert_eq!(build.log, LogMode::Json);
    }

    #[test]
    fn dir_flag_wins_over_positional() {
        let args = CliArgs::try_parse_from(["site", "build", "a", "-d", "b"]).unwrap();
        let Command::Build(build) = args.command else {
            panic!("expected build");
        };
        assert_eq!(build.build_dir(), Some(PathBuf::from("b")));
        assert_eq!(build.log, LogMode::Readable);
    }

    #[test]
    fn watch_takes_several_tasks() {
        let args = CliArgs::try_parse_from(["site", "watch", "css", "page", "-d", "out"]).unwrap();
        match args.command {
            Command::Watch { tasks, dir } => {
                assert_eq!(tasks, vec!["css", "page"]);
                assert_eq!(dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
