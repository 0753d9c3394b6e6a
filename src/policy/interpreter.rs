// src/policy/interpreter.rs

//! Interpreter allowlist.
//!
//! Bare names (`python`, `python3`, `python3.12`) are accepted by pattern and
//! left for the OS to resolve through `PATH`. Absolute paths are resolved
//! through symlinks and the resolved file must live under a standard
//! installation prefix or under a caller-approved extra location.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ValidationError;

static BARE_PYTHON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^python([0-9](\.[0-9]+)?)?$").expect("bare interpreter pattern is valid")
});

/// Installation prefixes trusted without any user approval.
pub const STANDARD_PREFIXES: &[&str] = &[
    "/usr/bin",
    "/usr/local/bin",
    "/bin",
    "/opt/homebrew",
    "/opt/local/bin",
    "/Library/Frameworks/Python.framework",
];

/// One user-approved extra interpreter location.
#[derive(Debug, Clone)]
pub enum InterpreterAllowance {
    /// A directory; the resolved interpreter must live below it.
    Prefix(PathBuf),
    /// A regex matched against the whole resolved path. Written in config
    /// with a leading `^`.
    Pattern(Regex),
}

impl InterpreterAllowance {
    fn permits(&self, resolved: &Path) -> bool {
        match self {
            InterpreterAllowance::Prefix(dir) => {
                if resolved.starts_with(dir) {
                    return true;
                }
                // The approved directory itself may sit behind a symlink
                // (e.g. /tmp -> /private/tmp on macOS).
                dir.canonicalize()
                    .map(|canon| resolved.starts_with(canon))
                    .unwrap_or(false)
            }
            InterpreterAllowance::Pattern(re) => re.is_match(&resolved.to_string_lossy()),
        }
    }
}

/// The set of places an absolute interpreter path may resolve into.
///
/// Passed explicitly to [`validate_interpreter`]; nothing here reads global
/// configuration.
#[derive(Debug, Clone)]
pub struct InterpreterAllowlist {
    standard: Vec<PathBuf>,
    extra: Vec<InterpreterAllowance>,
}

impl Default for InterpreterAllowlist {
    fn default() -> Self {
        Self::standard()
    }
}

impl InterpreterAllowlist {
    /// Only the built-in [`STANDARD_PREFIXES`].
    pub fn standard() -> Self {
        Self {
            standard: STANDARD_PREFIXES.iter().map(PathBuf::from).collect(),
            extra: Vec::new(),
        }
    }

    /// Standard prefixes plus the given user-approved entries.
    ///
    /// Entries starting with `^` are compiled as regexes; everything else is
    /// a directory prefix. Blank entries are skipped.
    pub fn with_extra<S: AsRef<str>>(entries: &[S]) -> Result<Self, ValidationError> {
        let mut list = Self::standard();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let allowance = if entry.starts_with('^') {
                let re = Regex::new(entry).map_err(|e| ValidationError::OptionValue {
                    option: "extra_interpreter_dirs",
                    reason: format!("invalid pattern '{entry}': {e}"),
                })?;
                InterpreterAllowance::Pattern(re)
            } else {
                let dir = PathBuf::from(entry);
                if !dir.is_absolute() {
                    return Err(ValidationError::OptionValue {
                        option: "extra_interpreter_dirs",
                        reason: format!("'{entry}' is not an absolute directory"),
                    });
                }
                InterpreterAllowance::Prefix(dir)
            };
            list.extra.push(allowance);
        }
        Ok(list)
    }

    /// Whether an already-resolved path is inside an allowed location.
    pub fn permits(&self, resolved: &Path) -> bool {
        self.standard.iter().any(|p| resolved.starts_with(p))
            || self.extra.iter().any(|a| a.permits(resolved))
    }
}

/// Validate the interpreter binary and return the executable to launch.
///
/// Bare names are returned unchanged. Absolute paths are returned as written
/// (so virtualenv launchers keep working) once their resolved target has
/// been checked.
pub fn validate_interpreter(
    binary: &str,
    allowlist: &InterpreterAllowlist,
) -> Result<String, ValidationError> {
    let reject = |reason: String| ValidationError::Interpreter {
        interpreter: binary.to_string(),
        reason,
    };

    if binary.is_empty() {
        return Err(ValidationError::EmptyInterpreter);
    }

    let path = Path::new(binary);
    if path.components().count() == 1 && !path.is_absolute() {
        if is_python_name(binary) {
            return Ok(binary.to_string());
        }
        return Err(reject(
            "bare interpreter names must look like python, python3 or python3.12".to_string(),
        ));
    }

    if !path.is_absolute() {
        return Err(reject(
            "interpreter paths must be absolute or a bare python name".to_string(),
        ));
    }

    let resolved = path
        .canonicalize()
        .map_err(|e| reject(format!("cannot resolve path: {e}")))?;

    let file_name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !is_python_name(&file_name) {
        return Err(reject(format!(
            "resolves to {resolved:?}, which is not a python interpreter"
        )));
    }

    if !allowlist.permits(&resolved) {
        return Err(reject(format!(
            "resolves to {resolved:?}, outside the standard install locations and approved directories"
        )));
    }

    tracing::debug!(interpreter = binary, ?resolved, "interpreter accepted");
    Ok(binary.to_string())
}

fn is_python_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".exe").unwrap_or(&lower);
    BARE_PYTHON.is_match(stem)
}
