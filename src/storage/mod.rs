//! Chronos Storage Engine
//!
//! This module provides buffering and persistence of log events:
//!
//! - **types**: Core data structures (Event, EventPayload, Block)
//! - **memtable**: Mutable columnar write buffer
//! - **compression**: Segment codec (JSON columns + gzip/LZ4)
//! - **segment**: Segment key naming
//! - **backend**: Blob backend interface, with `local` and `remote` realizations
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Event → MemTable → (threshold) → Encode → Compress → put(new key)
//!
//! Read Path:
//!   list_keys → read → Decompress → Decode → Block
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chronos::storage::{open_backend, BackendConfig, Event, MemTable, SegmentKeyGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = open_backend(&BackendConfig::local("./data"))?;
//!     backend.ensure_container().await?;
//!
//!     let mut table = MemTable::new();
//!     table.add(Event::new("web", "GET /index.html 200"));
//!
//!     let mut keys = SegmentKeyGenerator::default();
//!     if let Some(key) = table.flush(backend.as_ref(), &mut keys).await? {
//!         println!("wrote {}", key);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod compression;
pub mod error;
pub mod local;
pub mod memtable;
pub mod remote;
pub mod segment;
pub mod types;

// Re-export commonly used types
pub use backend::{open_backend, BackendConfig, BlobBackend};
pub use compression::{
    compression_stats, decode_block, decode_segment, encode_block, CompressionStats,
    SegmentCompression,
};
pub use error::{StorageError, StorageResult};
pub use local::LocalBackend;
pub use memtable::MemTable;
pub use remote::{RemoteBackend, RemoteConfig};
pub use segment::{SegmentKey, SegmentKeyGenerator, DEFAULT_SEGMENT_PREFIX};
pub use types::{Block, Event, EventPayload};
