// src/exec/scratch.rs

//! Scratch copy of the PRD with a leading instruction block.
//!
//! The original file is never modified. The copy lives in the sanctioned
//! temp directory with owner-only permissions and is deleted when the
//! [`ScratchInput`] is dropped or closed.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::errors::{Result, RunnerError};

pub const INSTRUCTIONS_BEGIN: &str = "<!-- autoprd:instructions:begin -->";
pub const INSTRUCTIONS_END: &str = "<!-- autoprd:instructions:end -->";

#[derive(Debug)]
pub struct ScratchInput {
    file: NamedTempFile,
}

impl ScratchInput {
    /// Copy `source` into a new file under `scratch_dir`, prefixed with the
    /// delimited `instruction` block.
    pub fn create(scratch_dir: &Path, source: &Path, instruction: &str) -> Result<Self> {
        let original = fs::read(source).map_err(|e| {
            RunnerError::Scratch(format!("reading {source:?}: {e}"))
        })?;

        ensure_private_dir(scratch_dir)?;

        let suffix = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_else(|| ".md".to_string());
        let mut file = tempfile::Builder::new()
            .prefix("prd-")
            .suffix(&suffix)
            .tempfile_in(scratch_dir)
            .map_err(|e| RunnerError::Scratch(format!("creating file in {scratch_dir:?}: {e}")))?;

        let block = format!(
            "{INSTRUCTIONS_BEGIN}\n{}\n{INSTRUCTIONS_END}\n\n",
            instruction.trim_end()
        );
        file.write_all(block.as_bytes())
            .and_then(|_| file.write_all(&original))
            .and_then(|_| file.flush())
            .map_err(|e| RunnerError::Scratch(format!("writing {:?}: {e}", file.path())))?;

        debug!(path = ?file.path(), source = ?source, "scratch input written");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, logging (not returning) a failure.
    pub fn close(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!(?path, error = %e, "failed to remove scratch input");
        }
    }
}

#[cfg(unix)]
fn ensure_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| RunnerError::Scratch(format!("creating {dir:?}: {e}")))
}

#[cfg(not(unix))]
fn ensure_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| RunnerError::Scratch(format!("creating {dir:?}: {e}")))
}
