//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::bus::MessageSink;
use crate::config::ApiConfig;
use crate::indexer::IndexerStats;
use crate::query::Coordinator;
use crate::storage::BlobBackend;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Search coordinator over the segment store
    pub coordinator: Coordinator,
    /// Segment store, also used for readiness checks
    pub backend: Arc<dyn BlobBackend>,
    /// Bus producer for ingest (absent on search-only deployments)
    pub ingest: Option<Arc<dyn MessageSink>>,
    /// Indexer counters, when the indexer runs in this process
    pub indexer_stats: Option<Arc<IndexerStats>>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Search-only state
    pub fn new(backend: Arc<dyn BlobBackend>, config: ApiConfig) -> Self {
        Self {
            coordinator: Coordinator::new(Arc::clone(&backend), config.scan_concurrency),
            backend,
            ingest: None,
            indexer_stats: None,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Accept `POST /ingest` by publishing to `sink`
    pub fn with_ingest(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.ingest = Some(sink);
        self
    }

    /// Report indexer counters on `/health`
    pub fn with_indexer_stats(mut self, stats: Arc<IndexerStats>) -> Self {
        self.indexer_stats = Some(stats);
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
