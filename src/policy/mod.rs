// src/policy/mod.rs

//! Validation policies applied before anything is spawned.
//!
//! Every check is a plain function over its inputs. The only filesystem
//! access is symlink resolution of interpreter and script paths; extra
//! allowlist entries and sanctioned directories are passed in explicitly.
//!
//! - [`interpreter`]: which python binaries may be launched.
//! - [`flags`]: which interpreter flags may be passed, plus the unbuffered
//!   output check.
//! - [`script`]: where the automation script may live.
//! - [`branch`]: branch-name and option-value syntax.

pub mod branch;
pub mod flags;
pub mod interpreter;
pub mod script;

pub use branch::{validate_branch_name, validate_option_value, MAX_BRANCH_NAME_LEN};
pub use flags::{requests_unbuffered, validate_flags, with_unbuffered, UNBUFFERED_FLAG};
pub use interpreter::{
    validate_interpreter, InterpreterAllowance, InterpreterAllowlist, STANDARD_PREFIXES,
};
pub use script::{
    resolve_repo_root, resolve_script_path, validate_script_path, SanctionedDirs, APP_DIR_NAME,
};
