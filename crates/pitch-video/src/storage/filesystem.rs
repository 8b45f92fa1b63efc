use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;

use super::{validate_key, ObjectStore, StoredObject};

/// Stores objects as plain files under a root directory.
///
/// URLs are `{base_url}/{key}`; serving the directory is someone else's job.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
    base_url: String,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(root: P, base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent).await?;
        }

        // Write next to the target and rename so readers never see a partial object.
        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let size_bytes = bytes.len() as u64;
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: partial.clone(),
                source: e,
            })?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                log::warn!("Failed to remove partial object {}: {}", partial.display(), cleanup);
            }
            return Err(StorageError::WriteFile { path, source: e });
        }

        log::debug!("Stored {} ({} bytes, {})", key, size_bytes, content_type);

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size_bytes,
        })
    }
}
