//! Indexing loop
//!
//! A single sequential loop owns the MemTable:
//!
//! ```text
//! fetch → decode payload → add → (threshold) flush → commit
//! ```
//!
//! A triggered flush runs before the next fetch, so at most `threshold` rows
//! are ever buffered. Offsets are committed only after the append and any
//! flush it triggered have completed, which gives at-least-once delivery:
//! a crash in between replays the message and may duplicate the row.
//!
//! Buffered rows are not durable. A crash before a flush loses them.

pub mod policy;

pub use policy::{FlushPolicy, DEFAULT_FLUSH_THRESHOLD};

use crate::bus::{BusMessage, BusResult, MessageSource};
use crate::storage::backend::BlobBackend;
use crate::storage::error::StorageResult;
use crate::storage::memtable::MemTable;
use crate::storage::segment::SegmentKeyGenerator;
use crate::storage::types::{Event, EventPayload};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared with the API for observability
#[derive(Debug, Default)]
pub struct IndexerStats {
    events_indexed: AtomicU64,
    malformed_payloads: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
    buffered_rows: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct IndexerSnapshot {
    pub events_indexed: u64,
    pub malformed_payloads: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub buffered_rows: u64,
}

impl IndexerStats {
    pub fn snapshot(&self) -> IndexerSnapshot {
        IndexerSnapshot {
            events_indexed: self.events_indexed.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            buffered_rows: self.buffered_rows.load(Ordering::Relaxed),
        }
    }
}

/// Owner of the active MemTable
pub struct Indexer {
    backend: Arc<dyn BlobBackend>,
    table: MemTable,
    keys: SegmentKeyGenerator,
    policy: FlushPolicy,
    flush_on_shutdown: bool,
    stats: Arc<IndexerStats>,
}

impl Indexer {
    pub fn new(backend: Arc<dyn BlobBackend>, keys: SegmentKeyGenerator, policy: FlushPolicy) -> Self {
        Self {
            backend,
            table: MemTable::with_capacity(policy.threshold()),
            keys,
            policy,
            flush_on_shutdown: true,
            stats: Arc::new(IndexerStats::default()),
        }
    }

    /// Whether buffered rows are flushed when the loop stops
    pub fn flush_on_shutdown(mut self, enabled: bool) -> Self {
        self.flush_on_shutdown = enabled;
        self
    }

    pub fn stats(&self) -> Arc<IndexerStats> {
        Arc::clone(&self.stats)
    }

    /// Rows appended but not yet flushed
    pub fn buffered(&self) -> usize {
        self.table.size()
    }

    /// Consume `source` until it closes or `shutdown` resolves
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> BusResult<IndexerSnapshot>
    where
        S: MessageSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            backend = self.backend.kind(),
            threshold = self.policy.threshold(),
            "Indexer started"
        );

        loop {
            let fetched = tokio::select! {
                _ = &mut shutdown => None,
                fetched = source.fetch() => fetched?,
            };
            let Some(message) = fetched else { break };
            self.process(source, message).await?;
        }

        if self.flush_on_shutdown {
            if let Err(e) = self.flush().await {
                tracing::error!(rows = self.table.size(), error = %e, "Final flush failed; buffered rows are lost");
            }
        } else if !self.table.is_empty() {
            tracing::warn!(rows = self.table.size(), "Discarding buffered rows on shutdown");
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            events = snapshot.events_indexed,
            flushes = snapshot.flushes,
            "Indexer stopped"
        );
        Ok(snapshot)
    }

    /// Handle one bus message and acknowledge it
    ///
    /// A malformed payload is acknowledged and dropped. When a triggered
    /// flush fails the rows stay buffered and the message is left
    /// uncommitted; the next append retries the flush.
    pub async fn process<S>(&mut self, source: &mut S, message: BusMessage) -> BusResult<()>
    where
        S: MessageSource + ?Sized,
    {
        match EventPayload::from_bytes(&message.payload) {
            Ok(payload) => {
                self.table.add(Event::from_payload(payload));
                self.stats.events_indexed.fetch_add(1, Ordering::Relaxed);
                self.record_buffered();

                if self.policy.should_flush(self.table.size()) {
                    if let Err(e) = self.flush().await {
                        tracing::error!(
                            offset = message.offset,
                            buffered = self.table.size(),
                            error = %e,
                            "Flush failed; rows kept in buffer"
                        );
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                self.stats.malformed_payloads.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(offset = message.offset, error = %e, "Skipping malformed payload");
            }
        }

        source.commit(&message).await
    }

    /// Persist the buffered rows as a new segment
    ///
    /// The current buffer is swapped for an empty one while the segment is
    /// written. If the write fails the frozen rows are put back in front of
    /// anything appended meanwhile.
    pub async fn flush(&mut self) -> StorageResult<Option<String>> {
        if self.table.is_empty() {
            return Ok(None);
        }

        let frozen = self.table.freeze();
        match frozen.flush(self.backend.as_ref(), &mut self.keys).await {
            Ok(key) => {
                self.stats.flushes.fetch_add(1, Ordering::Relaxed);
                self.record_buffered();
                if let Some(key) = &key {
                    tracing::info!(key = %key, rows = frozen.size(), "Flushed segment");
                }
                Ok(key)
            }
            Err(e) => {
                self.stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                self.table.restore(frozen);
                self.record_buffered();
                Err(e)
            }
        }
    }

    fn record_buffered(&self) {
        self.stats
            .buffered_rows
            .store(self.table.size() as u64, Ordering::Relaxed);
    }
}
