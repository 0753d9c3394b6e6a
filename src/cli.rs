// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::exec::DEFAULT_QUEUE_CAPACITY;

/// Command-line arguments for `autoprd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "autoprd",
    version,
    about = "Validate, launch and supervise the PRD-to-PR automation tool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `autoprd.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "autoprd.toml")]
    pub config: PathBuf,

    /// PRD file handed to the tool.
    #[arg(long, value_name = "PATH")]
    pub prd: PathBuf,

    /// Where the tool writes its complete log.
    ///
    /// Default: `<data dir>/autoprd/logs/run-<timestamp>.log`.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log level passed to the tool, overriding the configured one.
    #[arg(long, value_name = "LEVEL")]
    pub tool_log_level: Option<String>,

    /// Instruction text placed in front of the PRD for this run.
    #[arg(long, value_name = "TEXT", conflicts_with = "instruction_file")]
    pub instruction: Option<String>,

    /// Read the leading instruction from a file.
    #[arg(long, value_name = "PATH")]
    pub instruction_file: Option<PathBuf>,

    /// Seconds to wait after the interrupt before killing the process group.
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub grace_seconds: u64,

    /// Capacity of the live output queue, in lines.
    #[arg(long, value_name = "LINES", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Validate and print the invocation plan, but don't start the tool.
    #[arg(long)]
    pub print_plan: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AUTOPRD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
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
