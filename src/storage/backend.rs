//! Blob backend abstraction
//!
//! Segments live behind a small capability interface so the MemTable and the
//! scan engine never care whether bytes sit in a local directory or in a
//! networked object store. The realization is chosen once, from
//! configuration, when the backend is opened.
//!
//! Contract shared by all realizations:
//! - `list_keys` only reports segments whose `put` has completed
//! - `put` is only ever called with a fresh, previously unlisted key
//! - `ensure_container` is idempotent

use crate::storage::error::StorageResult;
use crate::storage::local::LocalBackend;
use crate::storage::remote::{RemoteBackend, RemoteConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Capability interface over segment storage
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Short name of the realization, for logs
    fn kind(&self) -> &'static str;

    /// Create the directory / bucket if it does not exist yet
    async fn ensure_container(&self) -> StorageResult<()>;

    /// Segment keys starting with `prefix`, in lexical (creation) order
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Read a whole segment
    ///
    /// Any file handle or connection is released before this returns,
    /// whether the read succeeded or not.
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store a segment under a new key; visible to `list_keys` only once complete
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;
}

/// Where segments are stored
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// A directory on the local filesystem
    Local {
        #[serde(default = "default_data_dir")]
        data_dir: PathBuf,
    },
    /// A bucket in an object store reachable over HTTP
    Remote(RemoteConfig),
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            data_dir: default_data_dir(),
        }
    }
}

impl BackendConfig {
    /// Local directory backend
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        BackendConfig::Local {
            data_dir: data_dir.into(),
        }
    }

    /// Human-readable location, for logs
    pub fn describe(&self) -> String {
        match self {
            BackendConfig::Local { data_dir } => format!("local:{}", data_dir.display()),
            BackendConfig::Remote(remote) => {
                format!("remote:{}/{}", remote.endpoint.trim_end_matches('/'), remote.bucket)
            }
        }
    }
}

/// Open the backend described by `config`
pub fn open_backend(config: &BackendConfig) -> StorageResult<Arc<dyn BlobBackend>> {
    match config {
        BackendConfig::Local { data_dir } => Ok(Arc::new(LocalBackend::new(data_dir))),
        BackendConfig::Remote(remote) => Ok(Arc::new(RemoteBackend::new(remote.clone())?)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend with call counters and failure switches for tests

    use super::*;
    use crate::storage::error::StorageError;
    use crate::storage::segment::SegmentKey;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryBackend {
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub calls: AtomicUsize,
        pub puts: AtomicUsize,
        pub fail_puts: AtomicBool,
        pub fail_lists: AtomicBool,
    }

    impl MemoryBackend {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Store raw bytes directly, bypassing `put`
        pub(crate) fn insert_raw(&self, key: &str, data: Vec<u8>) {
            self.objects.lock().unwrap().insert(key.to_string(), data);
        }

        pub(crate) fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobBackend for MemoryBackend {
        fn kind(&self) -> &'static str {
            "memory"
        }

        async fn ensure_container(&self) -> StorageResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("listing unavailable".into()));
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix) && SegmentKey::is_segment_key(k))
                .cloned()
                .collect())
        }

        async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::Backend(format!("no such key: {}", key)))
        }

        async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(StorageError::Flush("injected write failure".into()));
            }
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.insert_raw(key, data);
            Ok(())
        }
    }
}
