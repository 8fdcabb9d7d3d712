//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use crate::indexer::IndexerSnapshot;
use crate::query::{ScanResult, SearchMatch};
use serde::{Deserialize, Serialize};

// ============================================
// SEARCH DTOs
// ============================================

/// Query string of `GET /search`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Exact match on the event source
    #[serde(default)]
    pub source: Option<String>,
    /// Substring match on the message
    #[serde(default)]
    pub contains: Option<String>,
}

/// Search response body
///
/// Field names and order are part of the public protocol.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<SearchMatch>,
    pub stats: SearchStats,
}

#[derive(Debug, Serialize)]
pub struct SearchStats {
    pub scanned_segments: usize,
    pub scanned_events: usize,
    /// Wall-clock time of the whole scan, e.g. "1.523ms"
    pub duration: String,
    pub match_count: usize,
}

impl From<ScanResult> for SearchResponse {
    fn from(result: ScanResult) -> Self {
        Self {
            stats: SearchStats {
                scanned_segments: result.stats.scanned_segments,
                scanned_events: result.stats.scanned_events,
                duration: format!("{:?}", result.stats.duration),
                match_count: result.stats.match_count,
            },
            matches: result.matches,
        }
    }
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "unhealthy"
    pub status: String,
    /// Segment store status: "ok" or "error"
    pub storage: String,
    /// Backend location, e.g. "local" or "remote"
    pub backend: String,
    /// Whether `POST /ingest` is served here
    pub ingest: bool,
    /// Indexer counters, when the indexer runs in this process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer: Option<IndexerSnapshot>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
