use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary working directory owned by one stage of one job.
///
/// Removed when dropped, on every exit path including cancellation. Removal
/// failures are logged and otherwise ignored.
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Creates `{root or system temp}/{prefix}XXXXXX`.
    ///
    /// A missing `root` is created first, without blocking the runtime.
    pub async fn create(root: Option<&Path>, prefix: &str) -> std::io::Result<Self> {
        if let Some(root) = root {
            tokio::fs::create_dir_all(root).await?;
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory now, reporting any failure to the caller.
    pub fn close(mut self) -> std::io::Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                log::warn!(
                    "Failed to remove scratch directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
