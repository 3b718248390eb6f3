//! Per-run scratch directory.
//!
//! A [`RunWorkspace`] owns a temporary directory for every intermediate file a
//! run produces. Dropping it deletes the directory and everything in it, which
//! covers early returns, cancellation and unwinding alike.

use std::path::{Path, PathBuf};

use shortforge_core::{Error, Result, RunId};
use tempfile::TempDir;

/// Temporary directory owned by one pipeline run.
#[derive(Debug)]
pub struct RunWorkspace {
    temp_dir: TempDir,
}

impl RunWorkspace {
    /// Create a workspace under `parent`, or under the system temp dir.
    ///
    /// The directory name starts with `shortforge-<short run id>-`.
    pub fn new(parent: Option<&Path>, run_id: &RunId) -> Result<Self> {
        let prefix = format!("shortforge-{}-", run_id.short());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let temp_dir = match parent {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;

        tracing::debug!(path = %temp_dir.path().display(), "created run workspace");
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for a named file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Whether `path` lives inside this workspace.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(self.temp_dir.path())
    }

    /// Keep the directory on disk and return its path.
    #[allow(deprecated)]
    pub fn persist(self) -> PathBuf {
        self.temp_dir.into_path()
    }

    /// Delete the directory now, reporting any error.
    pub fn close(self) -> Result<()> {
        self.temp_dir.close()?;
        Ok(())
    }
}
