//! Chronos Query Engine
//!
//! Every search is a full scan over the segment store:
//!
//! - **Predicate**: optional exact `source` match plus optional `contains`
//!   substring match on the message; at least one is required
//! - **Executor**: the coordinator that lists, decodes and filters segments
//!
//! # Execution Pipeline
//!
//! ```text
//! Predicate → list_keys → (read → decode → filter) per segment → merge → ScanResult
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use chronos::query::{Coordinator, Predicate};
//! use chronos::storage::{open_backend, BackendConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = open_backend(&BackendConfig::local("./data"))?;
//! let coordinator = Coordinator::new(backend, 4);
//!
//! let predicate = Predicate::new(Some("web".into()), Some("failure".into()))?;
//! let result = coordinator.search(&predicate).await?;
//! println!("{} matches in {:?}", result.stats.match_count, result.stats.duration);
//! # Ok(())
//! # }
//! ```

mod error;
mod executor;
mod predicate;

pub use error::{QueryError, QueryResult};
pub use executor::{
    format_timestamp, Coordinator, ScanResult, ScanStats, SearchMatch, SegmentOutcome,
    DEFAULT_SCAN_CONCURRENCY,
};
pub use predicate::Predicate;
