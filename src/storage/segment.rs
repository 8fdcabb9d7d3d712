//! Segment naming for Chronos storage
//!
//! A segment is written exactly once under a fresh key and never rewritten:
//!
//! ```text
//! <prefix>_<flush-time ns since epoch>[-<instance>].<format+compression>
//! segment_1704067200123456789.json.gz
//! segment_1704067200123456789-indexer-2.json.lz4
//! ```
//!
//! Keys sort lexically in creation order for a single writer. The optional
//! instance suffix keeps keys from different indexers apart.

use crate::storage::compression::SegmentCompression;
use crate::storage::error::{StorageError, StorageResult};
use chrono::Utc;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Default key prefix
pub const DEFAULT_SEGMENT_PREFIX: &str = "segment";

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<prefix>[A-Za-z0-9_-]+?)_(?P<nanos>\d+)(?:-(?P<instance>[A-Za-z0-9_-]+))?\.(?P<suffix>json\.gz|json\.lz4)$",
        )
        .expect("segment key pattern is valid")
    })
}

/// Check that a prefix or instance id can be embedded in a key
pub fn validate_key_component(name: &str, value: &str) -> StorageResult<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::Config(format!(
            "{} must be non-empty and contain only [A-Za-z0-9_-], got {:?}",
            name, value
        )))
    }
}

/// Parsed segment key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub prefix: String,
    /// Flush instant in nanoseconds since the Unix epoch
    pub nanos: i64,
    pub instance: Option<String>,
    pub compression: SegmentCompression,
}

impl SegmentKey {
    /// Parse a key; anything that is not a segment key is rejected
    pub fn parse(key: &str) -> StorageResult<Self> {
        let caps = key_pattern()
            .captures(key)
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;

        let nanos = caps["nanos"]
            .parse()
            .map_err(|_| StorageError::InvalidKey(key.to_string()))?;
        let compression = SegmentCompression::from_key(key)
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;

        Ok(Self {
            prefix: caps["prefix"].to_string(),
            nanos,
            instance: caps.name("instance").map(|m| m.as_str().to_string()),
            compression,
        })
    }

    /// Check if a key names a segment
    pub fn is_segment_key(key: &str) -> bool {
        key_pattern().is_match(key)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.prefix, self.nanos)?;
        if let Some(instance) = &self.instance {
            write!(f, "-{}", instance)?;
        }
        write!(f, ".{}", self.compression.suffix())
    }
}

/// Issues fresh segment keys for one writer
///
/// The nanosecond component is strictly increasing across calls even when
/// the clock reports the same (or an earlier) instant twice.
#[derive(Debug, Clone)]
pub struct SegmentKeyGenerator {
    prefix: String,
    instance: Option<String>,
    compression: SegmentCompression,
    last_nanos: i64,
}

impl SegmentKeyGenerator {
    pub fn new(
        prefix: impl Into<String>,
        instance: Option<String>,
        compression: SegmentCompression,
    ) -> StorageResult<Self> {
        let prefix = prefix.into();
        validate_key_component("segment prefix", &prefix)?;
        if let Some(instance) = &instance {
            validate_key_component("instance id", instance)?;
        }

        Ok(Self {
            prefix,
            instance,
            compression,
            last_nanos: i64::MIN,
        })
    }

    pub fn compression(&self) -> SegmentCompression {
        self.compression
    }

    /// Next key stamped with the current time
    pub fn next_key(&mut self) -> SegmentKey {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.next_key_at(now)
    }

    /// Next key stamped with `nanos`, bumped past the previous key if needed
    pub fn next_key_at(&mut self, nanos: i64) -> SegmentKey {
        let nanos = if nanos <= self.last_nanos {
            self.last_nanos.saturating_add(1)
        } else {
            nanos
        };
        self.last_nanos = nanos;

        SegmentKey {
            prefix: self.prefix.clone(),
            nanos,
            instance: self.instance.clone(),
            compression: self.compression,
        }
    }
}

impl Default for SegmentKeyGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_SEGMENT_PREFIX.to_string(),
            instance: None,
            compression: SegmentCompression::default(),
            last_nanos: i64::MIN,
        }
    }
}
