// src/plan/env.rs

//! Tool environment: the ambient environment with reserved keys stripped,
//! then the keys this run controls added back in a fixed order.

use crate::config::ConfigSnapshot;
use crate::types::{ExecutorKind, OverridePhase};

pub const EXECUTOR_POLICY_KEY: &str = "AUTO_PRD_EXECUTOR_POLICY";
pub const UNSAFE_EXECUTION_KEY: &str = "AUTO_PRD_ALLOW_UNSAFE_EXECUTION";
pub const CI_KEY: &str = "CI";
pub const UNBUFFERED_KEY: &str = "PYTHONUNBUFFERED";

/// Keys never inherited from the ambient environment.
pub const RESERVED_KEYS: &[&str] = &[
    EXECUTOR_POLICY_KEY,
    "AUTO_PRD_EXECUTOR_IMPLEMENT",
    "AUTO_PRD_EXECUTOR_FIX",
    "AUTO_PRD_EXECUTOR_PR",
    "AUTO_PRD_EXECUTOR_REVIEW_FIX",
    UNSAFE_EXECUTION_KEY,
    CI_KEY,
    UNBUFFERED_KEY,
];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.iter().any(|r| same_key(r, key))
}

#[cfg(windows)]
fn same_key(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(not(windows))]
fn same_key(a: &str, b: &str) -> bool {
    a == b
}

pub(crate) fn tool_environment(
    snapshot: &ConfigSnapshot,
    ambient: Vec<(String, String)>,
) -> Vec<String> {
    let mut env: Vec<String> = ambient
        .into_iter()
        .filter(|(k, _)| !k.is_empty() && !is_reserved_key(k))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    let policy = snapshot.executor().policy.trim();
    if !policy.is_empty() {
        env.push(format!("{EXECUTOR_POLICY_KEY}={policy}"));
    }

    for phase in OverridePhase::ALL {
        // Only the two known executors pass; anything else is dropped.
        if let Ok(kind) = snapshot
            .executor()
            .override_for(phase)
            .parse::<ExecutorKind>()
        {
            env.push(format!("{}={kind}", phase.env_key()));
        }
    }

    if snapshot.flags().allow_unsafe_execution {
        env.push(format!("{UNSAFE_EXECUTION_KEY}=1"));
        env.push(format!("{CI_KEY}=1"));
    }

    env.push(format!("{UNBUFFERED_KEY}=1"));
    env
}
