// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ValidationError`] is raised by the policies in [`crate::policy`] and by
//!   the plan builder. It is always fatal and always raised before anything
//!   is spawned or written.
//! - [`RunnerError`] wraps everything else a run can fail with.

use std::path::PathBuf;

use thiserror::Error;

/// A rejected piece of configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("interpreter command is empty")]
    EmptyInterpreter,

    #[error("interpreter '{interpreter}' is not allowed: {reason}")]
    Interpreter { interpreter: String, reason: String },

    #[error("interpreter flag '{flag}' is not allowed: {reason}")]
    Flag { flag: String, reason: String },

    #[error("script path is empty")]
    EmptyScript,

    #[error("script path {path:?} is not allowed: {reason}")]
    ScriptPath { path: PathBuf, reason: String },

    #[error("repository root {path:?} is not usable: {reason}")]
    RepoRoot { path: PathBuf, reason: String },

    #[error("branch name '{name}' is invalid: {reason}")]
    BranchName { name: String, reason: String },

    #[error("value for {option} is invalid: {reason}")]
    OptionValue { option: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scratch file error: {0}")]
    Scratch(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("process exited unsuccessfully (code {0:?})")]
    ProcessFailed(Option<i32>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunnerError {
    /// True for caller-initiated stops, as opposed to genuine failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunnerError::Cancelled)
    }

    /// Process exit code for the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::Cancelled => 130,
            RunnerError::Validation(_) | RunnerError::Config(_) | RunnerError::Toml(_) => 2,
            RunnerError::ProcessFailed(Some(code)) => *code,
            _ => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunnerError>;
