// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Executors the automation tool knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Codex,
    Claude,
}

impl ExecutorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutorKind::Codex => "codex",
            ExecutorKind::Claude => "claude",
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "codex" => Ok(ExecutorKind::Codex),
            "claude" => Ok(ExecutorKind::Claude),
            other => Err(format!(
                "invalid executor: {other} (expected \"codex\" or \"claude\")"
            )),
        }
    }
}

/// Pipeline phases that can be switched on and off with `--phases`.
///
/// The order of [`RunPhase::ALL`] is the order used on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Local,
    Pr,
    ReviewFix,
}

impl RunPhase {
    pub const ALL: [RunPhase; 3] = [RunPhase::Local, RunPhase::Pr, RunPhase::ReviewFix];

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Local => "local",
            RunPhase::Pr => "pr",
            RunPhase::ReviewFix => "review_fix",
        }
    }
}

/// Phases that accept a per-phase executor override through the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePhase {
    Implement,
    Fix,
    Pr,
    ReviewFix,
}

impl OverridePhase {
    pub const ALL: [OverridePhase; 4] = [
        OverridePhase::Implement,
        OverridePhase::Fix,
        OverridePhase::Pr,
        OverridePhase::ReviewFix,
    ];

    /// Environment key carrying the override for this phase.
    pub fn env_key(self) -> &'static str {
        match self {
            OverridePhase::Implement => "AUTO_PRD_EXECUTOR_IMPLEMENT",
            OverridePhase::Fix => "AUTO_PRD_EXECUTOR_FIX",
            OverridePhase::Pr => "AUTO_PRD_EXECUTOR_PR",
            OverridePhase::ReviewFix => "AUTO_PRD_EXECUTOR_REVIEW_FIX",
        }
    }
}
