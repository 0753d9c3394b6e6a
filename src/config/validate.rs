// src/config/validate.rs

use crate::config::model::{ConfigSnapshot, RawConfig};
use crate::errors::{Result, RunnerError};
use crate::types::{ExecutorKind, OverridePhase};

impl TryFrom<RawConfig> for ConfigSnapshot {
    type Error = crate::errors::RunnerError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigSnapshot::new_unchecked(raw))
    }
}

/// Structural checks only. Security-relevant validation (interpreter,
/// flags, script containment, branch names) happens in the plan builder,
/// because the snapshot may also be assembled in code.
fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    ensure_has_interpreter(cfg)?;
    ensure_has_script(cfg)?;
    warn_about_unknown_overrides(cfg);
    Ok(())
}

fn ensure_has_interpreter(cfg: &RawConfig) -> Result<()> {
    if cfg.runner.python.trim().is_empty() {
        return Err(RunnerError::Config(
            "[runner].python must name an interpreter (e.g. \"python3\")".to_string(),
        ));
    }
    Ok(())
}

fn ensure_has_script(cfg: &RawConfig) -> Result<()> {
    if cfg.runner.script.as_os_str().is_empty() {
        return Err(RunnerError::Config(
            "[runner].script must point at the automation script".to_string(),
        ));
    }
    Ok(())
}

// Unknown overrides are dropped when the environment is built; surface them
// early so a typo does not go unnoticed.
fn warn_about_unknown_overrides(cfg: &RawConfig) {
    for phase in OverridePhase::ALL {
        let value = cfg.executor.override_for(phase);
        if !value.trim().is_empty() && value.parse::<ExecutorKind>().is_err() {
            tracing::warn!(
                key = phase.env_key(),
                value,
                "unrecognised executor override; it will be ignored"
            );
        }
    }
}
