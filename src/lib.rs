//! # Chronos
//!
//! Log-event storage and search. Producers submit timestamped events, an
//! indexer buffers them in a columnar MemTable and persists them as
//! compressed immutable segments, and a coordinator answers filter queries
//! by scanning every segment.
//!
//! ## Features
//!
//! - **Columnar buffering**: events pivot into parallel id/timestamp/source/message columns
//! - **Immutable segments**: self-describing JSON columns compressed with gzip or LZ4
//! - **Pluggable storage**: local directory or HTTP object store behind one interface
//! - **Continue-on-error scans**: an unreadable segment is skipped and counted, never fatal
//!
//! ## Modules
//!
//! - [`storage`]: Event types, MemTable, segment codec and blob backends
//! - [`bus`]: Message bus between ingest and the indexer
//! - [`indexer`]: Flush policy and the indexing loop
//! - [`query`]: Predicate and scan engine
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chronos::query::Coordinator;
//! use chronos::storage::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = open_backend(&BackendConfig::local("./data"))?;
//!     backend.ensure_container().await?;
//!
//!     // Buffer and flush a few events
//!     let mut table = MemTable::new();
//!     table.add(Event::new("web", "GET /index.html 200"));
//!     table.add(Event::new("web", "disk failure on /dev/sda"));
//!     table.flush(backend.as_ref(), &mut SegmentKeyGenerator::default()).await?;
//!
//!     // Search everything flushed so far
//!     let coordinator = Coordinator::new(backend, 4);
//!     let result = coordinator.query(Some("web".into()), Some("failure".into())).await?;
//!     for m in &result.matches {
//!         println!("[{}] {}: {}", m.timestamp, m.source, m.message);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bus;
pub mod config;
pub mod indexer;
pub mod query;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    open_backend, BackendConfig, BlobBackend, Block, Event, EventPayload, MemTable,
    SegmentCompression, SegmentKeyGenerator, StorageError, StorageResult,
};

pub use bus::{BusConsumer, BusError, BusMessage, BusProducer, MessageSink, MessageSource};

pub use indexer::{FlushPolicy, Indexer, IndexerSnapshot, IndexerStats};

pub use query::{Coordinator, Predicate, QueryError, QueryResult, ScanResult, ScanStats, SearchMatch};

pub use api::{build_router, serve, serve_on, ApiError, AppState};

pub use config::{
    ApiConfig, Config, ConfigError, IndexerConfig, LoggingConfig, StorageConfig,
};
