#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use autoprd::config::{ConfigSnapshot, RawConfig};
use autoprd::plan::PlanRequest;
use tempfile::TempDir;

/// Builder for `ConfigSnapshot` to simplify test setup.
///
/// Starts from `python = "python3"` and `script = "auto_prd_to_pr.py"` so the
/// result always passes structural validation; everything else is default.
pub struct SnapshotBuilder {
    config: RawConfig,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        let mut config = RawConfig::default();
        config.runner.python = "python3".to_string();
        config.runner.script = PathBuf::from("auto_prd_to_pr.py");
        Self { config }
    }

    pub fn python(mut self, command: &str) -> Self {
        self.config.runner.python = command.to_string();
        self
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.runner.script = path.into();
        self
    }

    pub fn repo(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.runner.repo = Some(path.into());
        self
    }

    pub fn no_repo(mut self) -> Self {
        self.config.runner.repo = None;
        self
    }

    pub fn base_branch(mut self, name: &str) -> Self {
        self.config.runner.base_branch = name.to_string();
        self
    }

    pub fn branch(mut self, name: &str) -> Self {
        self.config.runner.branch = name.to_string();
        self
    }

    pub fn codex_model(mut self, model: &str) -> Self {
        self.config.runner.codex_model = model.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.runner.log_level = level.to_string();
        self
    }

    pub fn extra_interpreter_dir(mut self, entry: &str) -> Self {
        self.config.runner.extra_interpreter_dirs.push(entry.to_string());
        self
    }

    pub fn executor_policy(mut self, policy: &str) -> Self {
        self.config.executor.policy = policy.to_string();
        self
    }

    pub fn executor_override(mut self, phase: &str, value: &str) -> Self {
        let slot = match phase {
            "implement" => &mut self.config.executor.implement,
            "fix" => &mut self.config.executor.fix,
            "pr" => &mut self.config.executor.pr,
            "review_fix" => &mut self.config.executor.review_fix,
            other => panic!("unknown override phase {other}"),
        };
        *slot = value.to_string();
        self
    }

    pub fn dry_run(mut self, on: bool) -> Self {
        self.config.flags.dry_run = on;
        self
    }

    pub fn sync_git(mut self, on: bool) -> Self {
        self.config.flags.sync_git = on;
        self
    }

    pub fn infinite_reviews(mut self, on: bool) -> Self {
        self.config.flags.infinite_reviews = on;
        self
    }

    pub fn allow_unsafe_execution(mut self, on: bool) -> Self {
        self.config.flags.allow_unsafe_execution = on;
        self
    }

    pub fn timings(mut self, wait: u32, poll: u32, idle: u32, iters: u32) -> Self {
        self.config.timings.wait_minutes = wait;
        self.config.timings.review_poll_seconds = poll;
        self.config.timings.idle_grace_minutes = idle;
        self.config.timings.max_local_iters = iters;
        self
    }

    pub fn phases(mut self, local: bool, pr: bool, review_fix: bool) -> Self {
        self.config.phases.local = local;
        self.config.phases.pr = pr;
        self.config.phases.review_fix = review_fix;
        self
    }

    pub fn raw(self) -> RawConfig {
        self.config
    }

    pub fn build(self) -> ConfigSnapshot {
        ConfigSnapshot::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A throwaway repository: a temp directory holding the automation script
/// and a PRD file.
pub struct FakeRepo {
    dir: TempDir,
}

impl FakeRepo {
    pub const SCRIPT: &'static str = "tools/auto_prd_to_pr.py";
    pub const PRD: &'static str = "docs/prd.md";
    pub const PRD_BODY: &'static str = "# PRD\n\nShip the thing.\n";

    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp repo");
        let repo = Self { dir };
        repo.write(Self::SCRIPT, "print('hello from the tool')\n");
        repo.write(Self::PRD, Self::PRD_BODY);
        repo
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Canonical root, as the plan builder reports resolved paths.
    pub fn canonical_root(&self) -> PathBuf {
        self.dir.path().canonicalize().expect("canonicalize temp repo")
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn prd_path(&self) -> PathBuf {
        self.path(Self::PRD)
    }

    pub fn log_file(&self) -> PathBuf {
        self.path("logs/run.log")
    }

    /// Snapshot builder already pointed at this repo and its script.
    pub fn snapshot(&self) -> SnapshotBuilder {
        SnapshotBuilder::new()
            .repo(self.root())
            .script(Self::SCRIPT)
    }

    pub fn request(&self) -> PlanRequest {
        PlanRequest::new(self.prd_path(), self.log_file())
    }
}

impl Default for FakeRepo {
    fn default() -> Self {
        Self::new()
    }
}
