//! Per-run scratch directory

use kiln_errors::{EnvironmentError, Error};
use std::path::{Path, PathBuf};

/// Scratch directory owned by exactly one run
///
/// The name carries a fresh UUID and the directory is created with
/// `create_dir`, so an existing directory is never reused.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create `<work_root>/<name>-<version>-<uuid>` with `src/` and `downloads/`
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::WorkDirUnavailable` if the directory cannot
    /// be created.
    pub async fn create(work_root: &Path, name: &str, version: &str) -> Result<Self, Error> {
        let unavailable = |path: &Path, e: &std::io::Error| EnvironmentError::WorkDirUnavailable {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(work_root)
            .await
            .map_err(|e| unavailable(work_root, &e))?;

        let root = work_root.join(format!(
            "{name}-{version}-{}",
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::create_dir(&root)
            .await
            .map_err(|e| unavailable(&root, &e))?;

        let dir = Self { root };
        for sub in [dir.src(), dir.downloads()] {
            tokio::fs::create_dir(&sub)
                .await
                .map_err(|e| unavailable(&sub, &e))?;
        }

        tracing::debug!(path = %dir.root.display(), "created work directory");
        Ok(dir)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where the source tree is unpacked
    #[must_use]
    pub fn src(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Downloaded archives and patches
    #[must_use]
    pub fn downloads(&self) -> PathBuf {
        self.root.join("downloads")
    }

    /// Remove the directory unless `keep` is set; returns the kept path
    pub async fn finish(self, keep: bool) -> Option<PathBuf> {
        if keep {
            return Some(self.root);
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            tracing::warn!(path = %self.root.display(), error = %e, "failed to remove work directory");
        }
        None
    }
}
