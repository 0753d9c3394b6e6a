// src/plan/args.rs

//! Tool command-line arguments derived from a snapshot.
//!
//! Field order is fixed: `--prd`, `--repo`, `--base`, `--branch`,
//! `--codex-model`, the boolean switches, the four timing windows,
//! `--phases`, `--executor-policy`, `--allow-unsafe-execution`,
//! `--log-file`, `--log-level`.

use std::path::Path;

use tracing::warn;

use crate::config::ConfigSnapshot;
use crate::errors::ValidationError;

use super::PlanRequest;

pub const PRD_FLAG: &str = "--prd";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Pick and normalise the log level handed to the tool.
///
/// Override beats configured beats `INFO`. `WARN` (any case) becomes
/// `WARNING`; everything else is upper-cased as is.
pub fn normalize_log_level(override_level: Option<&str>, configured: &str) -> String {
    let chosen = override_level
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| Some(configured.trim()).filter(|s| !s.is_empty()))
        .unwrap_or(DEFAULT_LOG_LEVEL);

    let upper = chosen.to_uppercase();
    if upper == "WARN" {
        "WARNING".to_string()
    } else {
        upper
    }
}

pub(crate) fn tool_arguments(
    snapshot: &ConfigSnapshot,
    request: &PlanRequest,
) -> Result<Vec<String>, ValidationError> {
    let mut args = Vec::new();

    push_pair(&mut args, PRD_FLAG, path_value("--prd", &request.prd_path)?);
    if let Some(repo) = snapshot.repo_root() {
        push_pair(&mut args, "--repo", path_value("--repo", repo)?);
    }
    push_non_empty(&mut args, "--base", snapshot.base_branch());
    push_non_empty(&mut args, "--branch", snapshot.branch());
    push_non_empty(&mut args, "--codex-model", snapshot.codex_model());

    let flags = snapshot.flags();
    push_switch(&mut args, "--dry-run", flags.dry_run);
    push_switch(&mut args, "--sync-git", flags.sync_git);
    push_switch(&mut args, "--infinite-reviews", flags.infinite_reviews);

    let timings = snapshot.timings();
    push_positive(&mut args, "--wait-minutes", timings.wait_minutes);
    push_positive(&mut args, "--review-poll-seconds", timings.review_poll_seconds);
    push_positive(&mut args, "--idle-grace-minutes", timings.idle_grace_minutes);
    push_positive(&mut args, "--max-local-iters", timings.max_local_iters);

    let phases = snapshot.phases().enabled();
    if phases.is_empty() {
        warn!("no phases enabled; omitting --phases so the tool uses its own default");
    } else {
        let joined = phases
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",");
        push_pair(&mut args, "--phases", joined);
    }

    push_non_empty(&mut args, "--executor-policy", &snapshot.executor().policy);
    push_switch(
        &mut args,
        "--allow-unsafe-execution",
        flags.allow_unsafe_execution,
    );

    push_pair(&mut args, "--log-file", path_value("--log-file", &request.log_file)?);
    push_pair(
        &mut args,
        "--log-level",
        normalize_log_level(request.log_level_override.as_deref(), snapshot.log_level()),
    );

    Ok(args)
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: String) {
    args.push(flag.to_string());
    args.push(value);
}

fn push_non_empty(args: &mut Vec<String>, flag: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        push_pair(args, flag, value.to_string());
    }
}

fn push_switch(args: &mut Vec<String>, flag: &str, on: bool) {
    if on {
        args.push(flag.to_string());
    }
}

fn push_positive(args: &mut Vec<String>, flag: &str, value: u32) {
    if value > 0 {
        push_pair(args, flag, value.to_string());
    }
}

fn path_value(option: &'static str, path: &Path) -> Result<String, ValidationError> {
    let value = path.to_str().ok_or_else(|| ValidationError::OptionValue {
        option,
        reason: format!("{path:?} is not valid UTF-8"),
    })?;
    if value.is_empty() {
        return Err(ValidationError::OptionValue {
            option,
            reason: "path is empty".to_string(),
        });
    }
    if value.starts_with('-') {
        return Err(ValidationError::OptionValue {
            option,
            reason: "path must not start with '-'".to_string(),
        });
    }
    Ok(value.to_string())
}
