//! Local filesystem backend
//!
//! Segments are plain files in one directory. Writes go to a hidden
//! temporary file first and are renamed into place, so a listing never sees
//! a half-written segment.

use crate::storage::backend::BlobBackend;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::segment::SegmentKey;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Segment store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, refusing anything that is not a segment key
    fn segment_path(&self, key: &str) -> StorageResult<PathBuf> {
        if !SegmentKey::is_segment_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!(".{}.tmp", key))
    }
}

#[async_trait]
impl BlobBackend for LocalBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn ensure_container(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            StorageError::Backend(format!(
                "Failed to create directory {:?}: {}",
                self.root, e
            ))
        })
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // Nothing flushed yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Backend(format!(
                    "Failed to list {:?}: {}",
                    self.root, e
                )))
            }
        };

        let mut keys = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                StorageError::Backend(format!("Failed to list {:?}: {}", self.root, e))
            })?;
            let Some(entry) = entry else { break };

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(prefix) && SegmentKey::is_segment_key(&name) {
                keys.push(name);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.segment_path(key)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let path = self.segment_path(key)?;
        let temp = self.temp_path(key);

        let written = async {
            tokio::fs::create_dir_all(&self.root).await?;
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, &path).await
        }
        .await;

        if let Err(e) = written {
            // Best effort: never leave a stray temp file behind
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::Flush(format!(
                "Failed to write segment {}: {}",
                key, e
            )));
        }

        Ok(())
    }
}
