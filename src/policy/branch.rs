// src/policy/branch.rs

//! Branch-name and option-value syntax checks.
//!
//! Values validated here end up as separate argv entries, never in a shell,
//! but the tool forwards branch names to git and its own argument parser, so
//! anything that git rejects or that could be read as a flag is refused.

use crate::errors::ValidationError;

pub const MAX_BRANCH_NAME_LEN: usize = 255;

const SHELL_SIGNIFICANT: &[char] = &[
    '~', '^', ':', '?', '*', '[', ']', '$', ';', '&', '|', '<', '>', '(', ')', '{', '}', '\'',
    '"', '`', '!', '#',
];

pub fn validate_branch_name(name: &str) -> Result<(), ValidationError> {
    let reject = |reason: &str| ValidationError::BranchName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(reject("empty"));
    }
    if name.len() > MAX_BRANCH_NAME_LEN {
        return Err(reject(&format!(
            "longer than {MAX_BRANCH_NAME_LEN} bytes"
        )));
    }
    if name.starts_with(['.', '/', '-']) {
        return Err(reject("must not start with '.', '/' or '-'"));
    }
    if name.ends_with(['.', '/']) || name.ends_with(".lock") {
        return Err(reject("must not end with '.', '/' or '.lock'"));
    }
    if name.contains("..") || name.contains("//") {
        return Err(reject("must not contain '..' or '//'"));
    }
    if name.contains("@{") {
        return Err(reject("must not contain '@{'"));
    }
    if name.contains('\\') {
        return Err(reject("must not contain backslashes"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(reject("must not contain whitespace"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| SHELL_SIGNIFICANT.contains(c) || c.is_control())
    {
        return Err(reject(&format!("must not contain {c:?}")));
    }

    Ok(())
}

/// Generic guard for free-form values passed as `--flag VALUE` (model id,
/// executor policy). Empty values are fine: they are simply not emitted.
pub fn validate_option_value(option: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    let reject = |reason: &str| ValidationError::OptionValue {
        option,
        reason: reason.to_string(),
    };
    if value.starts_with('-') {
        return Err(reject("must not start with '-'"));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(reject("must not contain whitespace or control characters"));
    }
    Ok(())
}
