pub mod filesystem;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageError;

pub use filesystem::FilesystemStore;

/// Where an uploaded object ended up.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
}

/// Write-only object storage used for extracted frames and audio.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;
}

/// Rejects keys that could escape the store's namespace.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };

    if key.is_empty() {
        return invalid("key is empty");
    }
    if key.starts_with('/') || key.contains('\\') {
        return invalid("key must be a relative, '/'-separated path");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return invalid("key contains an empty, '.' or '..' segment");
    }
    Ok(())
}
