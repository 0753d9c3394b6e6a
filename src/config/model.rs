// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{OverridePhase, RunPhase};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [runner]
/// python = "python3 -u"
/// script = "tools/auto_prd_to_pr.py"
/// repo = "/home/me/src/project"
/// base_branch = "main"
/// branch = "feature/prd-42"
/// codex_model = "gpt-5-codex"
/// log_level = "info"
/// extra_interpreter_dirs = ["/home/me/.pyenv/versions"]
///
/// [executor]
/// policy = "codex-first"
/// review_fix = "claude"
///
/// [flags]
/// sync_git = true
///
/// [timings]
/// wait_minutes = 7
/// review_poll_seconds = 33
///
/// [phases]
/// pr = false
/// ```
///
/// All sections are optional and have defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub flags: FlagsSection,

    #[serde(default)]
    pub timings: TimingsSection,

    #[serde(default)]
    pub phases: PhasesSection,
}

/// `[runner]` section: what to run and against which repository.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerSection {
    /// Interpreter command, binary plus optional flags (e.g. `"python3 -O"`).
    #[serde(default)]
    pub python: String,

    /// Path to the automation script. Relative paths are resolved against
    /// `repo` when it is set.
    #[serde(default)]
    pub script: PathBuf,

    #[serde(default)]
    pub repo: Option<PathBuf>,

    #[serde(default)]
    pub base_branch: String,

    #[serde(default)]
    pub branch: String,

    #[serde(default)]
    pub codex_model: String,

    /// Log level handed to the tool; empty means `INFO`.
    #[serde(default)]
    pub log_level: String,

    /// Extra directories (or `^regex` patterns) the user approved for
    /// absolute interpreter paths.
    #[serde(default)]
    pub extra_interpreter_dirs: Vec<String>,
}

/// `[executor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorSection {
    #[serde(default)]
    pub policy: String,

    #[serde(default)]
    pub implement: String,

    #[serde(default)]
    pub fix: String,

    #[serde(default)]
    pub pr: String,

    #[serde(default)]
    pub review_fix: String,
}

impl ExecutorSection {
    /// Raw (unnormalized) override configured for `phase`.
    pub fn override_for(&self, phase: OverridePhase) -> &str {
        match phase {
            OverridePhase::Implement => &self.implement,
            OverridePhase::Fix => &self.fix,
            OverridePhase::Pr => &self.pr,
            OverridePhase::ReviewFix => &self.review_fix,
        }
    }
}

/// `[flags]` section.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FlagsSection {
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub sync_git: bool,

    #[serde(default)]
    pub infinite_reviews: bool,

    #[serde(default)]
    pub allow_unsafe_execution: bool,
}

/// `[timings]` section. Zero means "use the tool's default".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TimingsSection {
    #[serde(default)]
    pub wait_minutes: u32,

    #[serde(default)]
    pub review_poll_seconds: u32,

    #[serde(default)]
    pub idle_grace_minutes: u32,

    #[serde(default)]
    pub max_local_iters: u32,
}

/// `[phases]` section. Every phase is enabled unless switched off.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PhasesSection {
    #[serde(default = "enabled")]
    pub local: bool,

    #[serde(default = "enabled")]
    pub pr: bool,

    #[serde(default = "enabled")]
    pub review_fix: bool,
}

fn enabled() -> bool {
    true
}

impl Default for PhasesSection {
    fn default() -> Self {
        Self {
            local: true,
            pr: true,
            review_fix: true,
        }
    }
}

impl PhasesSection {
    pub fn is_enabled(&self, phase: RunPhase) -> bool {
        match phase {
            RunPhase::Local => self.local,
            RunPhase::Pr => self.pr,
            RunPhase::ReviewFix => self.review_fix,
        }
    }

    /// Enabled phases in command-line order.
    pub fn enabled(&self) -> Vec<RunPhase> {
        RunPhase::ALL
            .into_iter()
            .filter(|p| self.is_enabled(*p))
            .collect()
    }
}

/// Validated, read-only configuration for one invocation.
///
/// Only constructible through `TryFrom<RawConfig>` (see `validate.rs`), so a
/// snapshot always has an interpreter command and a script path.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    runner: RunnerSection,
    executor: ExecutorSection,
    flags: FlagsSection,
    timings: TimingsSection,
    phases: PhasesSection,
}

impl ConfigSnapshot {
    pub(crate) fn new_unchecked(raw: RawConfig) -> Self {
        Self {
            runner: raw.runner,
            executor: raw.executor,
            flags: raw.flags,
            timings: raw.timings,
            phases: raw.phases,
        }
    }

    pub fn interpreter_command(&self) -> &str {
        &self.runner.python
    }

    pub fn script(&self) -> &Path {
        &self.runner.script
    }

    pub fn repo_root(&self) -> Option<&Path> {
        self.runner
            .repo
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn base_branch(&self) -> &str {
        &self.runner.base_branch
    }

    pub fn branch(&self) -> &str {
        &self.runner.branch
    }

    pub fn codex_model(&self) -> &str {
        &self.runner.codex_model
    }

    pub fn log_level(&self) -> &str {
        &self.runner.log_level
    }

    pub fn extra_interpreter_dirs(&self) -> &[String] {
        &self.runner.extra_interpreter_dirs
    }

    pub fn executor(&self) -> &ExecutorSection {
        &self.executor
    }

    pub fn flags(&self) -> FlagsSection {
        self.flags
    }

    pub fn timings(&self) -> TimingsSection {
        self.timings
    }

    pub fn phases(&self) -> PhasesSection {
        self.phases
    }
}
