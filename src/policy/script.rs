// src/policy/script.rs

//! Script location resolution and containment.
//!
//! With a repository root, the script must resolve to a file inside that
//! root. Without one, it must resolve into one of the [`SanctionedDirs`].

use std::path::{Component, Path, PathBuf};

use crate::errors::ValidationError;

/// Name of the application-scoped subdirectory used under the temp and data
/// directories.
pub const APP_DIR_NAME: &str = "autoprd";

/// Locations trusted to hold generated files when no repository root is
/// configured: an application temp subdirectory and a per-user data
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanctionedDirs {
    temp: PathBuf,
    data: Option<PathBuf>,
}

impl SanctionedDirs {
    pub fn new(temp: impl Into<PathBuf>, data: Option<PathBuf>) -> Self {
        Self {
            temp: temp.into(),
            data,
        }
    }

    /// `<temp_dir>/autoprd` and `<data_dir>/autoprd` for the current user.
    pub fn platform_default() -> Self {
        Self {
            temp: std::env::temp_dir().join(APP_DIR_NAME),
            data: dirs::data_dir().map(|d| d.join(APP_DIR_NAME)),
        }
    }

    /// Scratch directory for generated input files.
    pub fn temp_dir(&self) -> &Path {
        &self.temp
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data.as_deref()
    }

    /// Whether a resolved path lies inside one of the sanctioned
    /// directories. Directories are compared in resolved form when they
    /// exist.
    pub fn contains(&self, resolved: &Path) -> bool {
        std::iter::once(self.temp.as_path())
            .chain(self.data.as_deref())
            .any(|dir| {
                let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
                is_strictly_below(&dir, resolved)
            })
    }
}

impl Default for SanctionedDirs {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Resolve the configured script path and check containment on the
/// resolved value.
///
/// Relative paths are joined against the repository root when one is
/// configured (otherwise the working directory). The returned path is the
/// one that was validated and is the one that must be executed.
pub fn resolve_script_path(
    script: &Path,
    repo_root: Option<&Path>,
    sanctioned: &SanctionedDirs,
) -> Result<PathBuf, ValidationError> {
    if script.as_os_str().is_empty() {
        return Err(ValidationError::EmptyScript);
    }

    let joined = match (script.is_absolute(), repo_root) {
        (true, _) => script.to_path_buf(),
        (false, Some(root)) => root.join(script),
        (false, None) => script.to_path_buf(),
    };

    let resolved = joined.canonicalize().map_err(|e| ValidationError::ScriptPath {
        path: joined.clone(),
        reason: format!("cannot resolve: {e}"),
    })?;

    if !resolved.is_file() {
        return Err(ValidationError::ScriptPath {
            path: resolved,
            reason: "not a regular file".to_string(),
        });
    }

    validate_script_path(&resolved, repo_root, sanctioned)?;
    Ok(resolved)
}

/// Containment check for an already-resolved script path.
pub fn validate_script_path(
    resolved: &Path,
    repo_root: Option<&Path>,
    sanctioned: &SanctionedDirs,
) -> Result<(), ValidationError> {
    match repo_root {
        Some(root) => {
            let root = resolve_repo_root(root)?;
            let relative = resolved
                .strip_prefix(&root)
                .map_err(|_| ValidationError::ScriptPath {
                    path: resolved.to_path_buf(),
                    reason: format!("outside the repository root {root:?}"),
                })?;
            if relative.as_os_str().is_empty()
                || relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(ValidationError::ScriptPath {
                    path: resolved.to_path_buf(),
                    reason: "relative path from the repository root escapes it".to_string(),
                });
            }
            Ok(())
        }
        None if sanctioned.contains(resolved) => Ok(()),
        None => Err(ValidationError::ScriptPath {
            path: resolved.to_path_buf(),
            reason: "without a repository root the script must live in the autoprd temp or data directory".to_string(),
        }),
    }
}

/// Canonical form of the repository root; it must be an existing directory.
pub fn resolve_repo_root(root: &Path) -> Result<PathBuf, ValidationError> {
    let resolved = root.canonicalize().map_err(|e| ValidationError::RepoRoot {
        path: root.to_path_buf(),
        reason: format!("cannot resolve: {e}"),
    })?;
    if !resolved.is_dir() {
        return Err(ValidationError::RepoRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(resolved)
}

fn is_strictly_below(dir: &Path, path: &Path) -> bool {
    match path.strip_prefix(dir) {
        Ok(rel) => {
            !rel.as_os_str().is_empty()
                && rel.components().all(|c| matches!(c, Component::Normal(_)))
        }
        Err(_) => false,
    }
}
