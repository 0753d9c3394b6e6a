// src/plan/mod.rs

//! Invocation plans.
//!
//! A plan is the complete, validated description of one tool run: the
//! executable, its argv (interpreter flags, script, tool flags) and the
//! full environment. [`PlanBuilder`] is the only validating constructor; it
//! either returns a whole plan or a [`ValidationError`](crate::errors::ValidationError).

pub mod args;
pub mod builder;
pub mod env;

use std::fmt;
use std::path::{Path, PathBuf};

pub use args::{normalize_log_level, DEFAULT_LOG_LEVEL, PRD_FLAG};
pub use builder::PlanBuilder;
pub use env::{is_reserved_key, RESERVED_KEYS};

/// Per-run inputs that do not come from the configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    /// The PRD file handed to the tool with `--prd`.
    pub prd_path: PathBuf,
    /// Where the tool writes its own complete log (`--log-file`).
    pub log_file: PathBuf,
    /// Wins over the configured log level when set and non-blank.
    pub log_level_override: Option<String>,
}

impl PlanRequest {
    pub fn new(prd_path: impl Into<PathBuf>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            prd_path: prd_path.into(),
            log_file: log_file.into(),
            log_level_override: None,
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level_override = Some(level.into());
        self
    }
}

/// Executable, arguments and environment for one run. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    executable: String,
    arguments: Vec<String>,
    environment: Vec<String>,
}

impl InvocationPlan {
    /// Assemble a plan without any validation.
    ///
    /// Meant for front ends that construct their own command (and for
    /// tests); configuration-derived plans go through [`PlanBuilder`].
    pub fn from_parts(
        executable: impl Into<String>,
        arguments: Vec<String>,
        environment: Vec<String>,
    ) -> Self {
        Self {
            executable: executable.into(),
            arguments,
            environment,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// `KEY=VALUE` entries, in the order they are applied.
    pub fn environment(&self) -> &[String] {
        &self.environment
    }

    /// Environment split into key/value pairs. Entries without `=` or with
    /// an empty key are skipped.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.environment
            .iter()
            .filter_map(|e| e.split_once('='))
            .filter(|(k, _)| !k.is_empty())
    }

    /// Value following the first `--prd` argument.
    pub fn prd_path(&self) -> Option<&str> {
        self.prd_index().map(|i| self.arguments[i].as_str())
    }

    /// Copy of this plan with the `--prd` value replaced. `None` if the plan
    /// has no `--prd` argument.
    pub fn with_prd_path(&self, path: &Path) -> Option<InvocationPlan> {
        let idx = self.prd_index()?;
        let mut arguments = self.arguments.clone();
        arguments[idx] = path.to_string_lossy().into_owned();
        Some(InvocationPlan {
            executable: self.executable.clone(),
            arguments,
            environment: self.environment.clone(),
        })
    }

    fn prd_index(&self) -> Option<usize> {
        self.arguments
            .iter()
            .position(|a| a == PRD_FLAG)
            .map(|i| i + 1)
            .filter(|i| *i < self.arguments.len())
    }
}

impl fmt::Display for InvocationPlan {
    /// Shell-style rendering of the command line (environment omitted).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.executable))?;
        for arg in &self.arguments {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:=@+".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
