//! Scan engine
//!
//! The coordinator answers a [`Predicate`] by scanning every segment the
//! backend lists at the moment the query starts.
//!
//! # Execution Pipeline
//!
//! ```text
//! list_keys("") ──► read ─► decode ─► filter ──► SegmentOutcome ──► merge
//!                   (up to `concurrency` segments in flight, results kept in listing order)
//! ```
//!
//! A listing failure aborts the query. A segment that cannot be read or
//! decoded is skipped and counted; it never fails the scan.

use crate::query::error::{QueryError, QueryResult};
use crate::query::predicate::Predicate;
use crate::storage::backend::BlobBackend;
use crate::storage::compression::decode_segment;
use crate::storage::error::StorageError;
use crate::storage::types::Block;
use chrono::{SecondsFormat, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

/// One matching row
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchMatch {
    /// RFC3339, second precision, UTC
    pub timestamp: String,
    pub source: String,
    pub message: String,
}

/// Aggregate counters for one search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Segments listed, readable or not
    pub scanned_segments: usize,
    /// Rows examined across all decoded segments
    pub scanned_events: usize,
    /// Segments skipped because they could not be read or decoded
    pub unreadable_segments: usize,
    pub match_count: usize,
    pub duration: Duration,
}

/// What happened to a single segment during a scan
#[derive(Debug)]
pub enum SegmentOutcome {
    Scanned {
        key: String,
        rows: usize,
        matches: Vec<SearchMatch>,
    },
    Unreadable {
        key: String,
        error: StorageError,
    },
}

impl SegmentOutcome {
    pub fn key(&self) -> &str {
        match self {
            SegmentOutcome::Scanned { key, .. } | SegmentOutcome::Unreadable { key, .. } => key,
        }
    }
}

/// Matches in segment-listing order, then row order
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub matches: Vec<SearchMatch>,
    pub stats: ScanStats,
    /// Keys of the segments that were skipped
    pub unreadable: Vec<String>,
}

/// Stateless search coordinator over a blob backend
#[derive(Clone)]
pub struct Coordinator {
    backend: Arc<dyn BlobBackend>,
    concurrency: usize,
}

impl Coordinator {
    pub fn new(backend: Arc<dyn BlobBackend>, concurrency: usize) -> Self {
        Self {
            backend,
            concurrency: concurrency.max(1),
        }
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    /// Validate the filters and search; a rejected predicate costs no I/O
    pub async fn query(
        &self,
        source: Option<String>,
        contains: Option<String>,
    ) -> QueryResult<ScanResult> {
        let predicate = Predicate::new(source, contains)?;
        self.search(&predicate).await
    }

    /// Scan every listed segment with `predicate`
    pub async fn search(&self, predicate: &Predicate) -> QueryResult<ScanResult> {
        let start = Instant::now();

        let keys = self
            .backend
            .list_keys("")
            .await
            .map_err(QueryError::Backend)?;
        let scanned_segments = keys.len();

        let outcomes: Vec<SegmentOutcome> = stream::iter(keys)
            .map(|key| self.scan_segment(key, predicate))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut matches = Vec::new();
        let mut unreadable = Vec::new();
        let mut scanned_events = 0;

        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Scanned {
                    rows, matches: found, ..
                } => {
                    scanned_events += rows;
                    matches.extend(found);
                }
                SegmentOutcome::Unreadable { key, .. } => unreadable.push(key),
            }
        }

        let stats = ScanStats {
            scanned_segments,
            scanned_events,
            unreadable_segments: unreadable.len(),
            match_count: matches.len(),
            duration: start.elapsed(),
        };

        tracing::debug!(
            source = ?predicate.source(),
            contains = ?predicate.contains(),
            segments = stats.scanned_segments,
            events = stats.scanned_events,
            unreadable = stats.unreadable_segments,
            matches = stats.match_count,
            duration = ?stats.duration,
            "Search complete"
        );

        Ok(ScanResult {
            matches,
            stats,
            unreadable,
        })
    }

    async fn scan_segment(&self, key: String, predicate: &Predicate) -> SegmentOutcome {
        let block = match self.backend.read(&key).await {
            Ok(data) => decode_segment(&key, &data),
            Err(e) => Err(e),
        };

        match block {
            Ok(block) => {
                let matches = collect_matches(&block, predicate);
                SegmentOutcome::Scanned {
                    key,
                    rows: block.len(),
                    matches,
                }
            }
            Err(error) => {
                tracing::warn!(
                    key = %key,
                    corrupt = error.is_decode(),
                    error = %error,
                    "Skipping unreadable segment"
                );
                SegmentOutcome::Unreadable { key, error }
            }
        }
    }
}

fn collect_matches(block: &Block, predicate: &Predicate) -> Vec<SearchMatch> {
    predicate
        .matching_rows(block)
        .into_iter()
        .map(|i| SearchMatch {
            timestamp: format_timestamp(block.timestamps()[i]),
            source: block.sources()[i].clone(),
            message: block.messages()[i].clone(),
        })
        .collect()
}

/// Epoch milliseconds as an RFC3339 string
///
/// Out-of-range values fall back to the raw number.
pub fn format_timestamp(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::testing::MemoryBackend;
    use crate::storage::compression::SegmentCompression;
    use crate::storage::local::LocalBackend;
    use crate::storage::memtable::MemTable;
    use crate::storage::segment::SegmentKeyGenerator;
    use crate::storage::types::Event;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    async fn write_segment(
        backend: &dyn BlobBackend,
        keys: &mut SegmentKeyGenerator,
        events: Vec<Event>,
    ) -> String {
        let mut table = MemTable::new();
        for event in events {
            table.add(event);
        }
        table.flush(backend, keys).await.unwrap().unwrap()
    }

    /// The three-segment store used by most tests
    async fn seeded_store(backend: &dyn BlobBackend) -> Vec<String> {
        let mut keys = SegmentKeyGenerator::default();
        let mut written = Vec::new();
        for (source, message) in [("web", "boot ok"), ("web", "disk failure"), ("db", "disk failure")] {
            let event = Event::new(source, message).timestamp(1_700_000_000_000);
            written.push(write_segment(backend, &mut keys, vec![event]).await);
        }
        written
    }

    fn pairs(result: &ScanResult) -> Vec<(&str, &str)> {
        result
            .matches
            .iter()
            .map(|m| (m.source.as_str(), m.message.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_three_segment_scenario() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path()));
        seeded_store(backend.as_ref()).await;
        let coordinator = Coordinator::new(backend, 2);

        let by_source = coordinator.query(Some("web".into()), None).await.unwrap();
        assert_eq!(
            pairs(&by_source),
            vec![("web", "boot ok"), ("web", "disk failure")]
        );
        assert_eq!(by_source.stats.scanned_events, 3);
        assert_eq!(by_source.stats.scanned_segments, 3);
        assert_eq!(by_source.stats.match_count, 2);

        let by_text = coordinator
            .query(None, Some("failure".into()))
            .await
            .unwrap();
        assert_eq!(
            pairs(&by_text),
            vec![("web", "disk failure"), ("db", "disk failure")]
        );
        assert_eq!(by_text.stats.scanned_events, 3);

        let both = coordinator
            .query(Some("web".into()), Some("failure".into()))
            .await
            .unwrap();
        assert_eq!(pairs(&both), vec![("web", "disk failure")]);
        assert_eq!(both.matches[0].timestamp, "2023-11-14T22:13:20Z");
    }

    #[tokio::test]
    async fn test_corrupt_segment_is_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        let written = seeded_store(backend.as_ref()).await;

        // Overwrite the middle segment with garbage
        backend.insert_raw(&written[1], b"\x1f\x8b not really gzip".to_vec());

        let coordinator = Coordinator::new(backend, 4);
        let result = coordinator
            .query(None, Some("disk".into()))
            .await
            .unwrap();

        assert_eq!(pairs(&result), vec![("db", "disk failure")]);
        assert_eq!(result.stats.scanned_segments, 3);
        assert_eq!(result.stats.scanned_events, 2);
        assert_eq!(result.stats.unreadable_segments, 1);
        assert_eq!(result.unreadable, vec![written[1].clone()]);
    }

    #[tokio::test]
    async fn test_search_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        seeded_store(backend.as_ref()).await;
        let coordinator = Coordinator::new(backend, 3);
        let predicate = Predicate::new(None, Some("o".into())).unwrap();

        let first = coordinator.search(&predicate).await.unwrap();
        let second = coordinator.search(&predicate).await.unwrap();

        assert_eq!(first.matches, second.matches);
        assert_eq!(first.stats.scanned_events, second.stats.scanned_events);
        assert_eq!(first.stats.match_count, second.stats.match_count);
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_backend_calls() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = Coordinator::new(backend.clone(), 4);

        let err = coordinator.query(None, None).await.unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let backend = Arc::new(MemoryBackend::new());
        seeded_store(backend.as_ref()).await;
        backend.fail_lists.store(true, Ordering::SeqCst);

        let coordinator = Coordinator::new(backend, 4);
        let err = coordinator
            .query(Some("web".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Backend(_)));
    }

    #[tokio::test]
    async fn test_order_preserved_across_concurrency() {
        let backend = Arc::new(MemoryBackend::new());
        let mut keys = SegmentKeyGenerator::default();
        for segment in 0..12 {
            let events = (0..5)
                .map(|row| Event::new("app", format!("segment {} row {}", segment, row)))
                .collect();
            write_segment(backend.as_ref(), &mut keys, events).await;
        }

        let sequential = Coordinator::new(backend.clone(), 1)
            .query(Some("app".into()), None)
            .await
            .unwrap();
        let parallel = Coordinator::new(backend, 8)
            .query(Some("app".into()), None)
            .await
            .unwrap();

        assert_eq!(sequential.matches, parallel.matches);
        assert_eq!(parallel.stats.scanned_events, 60);
        assert_eq!(parallel.matches[0].message, "segment 0 row 0");
        assert_eq!(parallel.matches[59].message, "segment 11 row 4");
    }

    #[tokio::test]
    async fn test_mixed_compression_store() {
        let backend = Arc::new(MemoryBackend::new());
        let mut gzip = SegmentKeyGenerator::default();
        let mut lz4 = SegmentKeyGenerator::new("segment", None, SegmentCompression::Lz4).unwrap();

        write_segment(backend.as_ref(), &mut gzip, vec![Event::new("web", "from gzip")]).await;
        write_segment(backend.as_ref(), &mut lz4, vec![Event::new("web", "from lz4")]).await;

        let result = Coordinator::new(backend, 2)
            .query(None, Some("from".into()))
            .await
            .unwrap();
        assert_eq!(result.stats.match_count, 2);
        assert_eq!(result.stats.unreadable_segments, 0);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let backend = Arc::new(MemoryBackend::new());
        let result = Coordinator::new(backend, 4)
            .query(Some("web".into()), None)
            .await
            .unwrap();
        assert!(result.matches.is_empty());
        assert_eq!(result.stats, ScanStats {
            duration: result.stats.duration,
            ..ScanStats::default()
        });
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(1_700_000_000_999), "2023-11-14T22:13:20Z");
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_segment_outcome_key() {
        let outcome = SegmentOutcome::Unreadable {
            key: "segment_1.json.gz".into(),
            error: StorageError::Decode("bad".into()),
        };
        assert_eq!(outcome.key(), "segment_1.json.gz");
    }
}
