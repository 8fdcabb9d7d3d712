//! Row-count flush policy

use crate::storage::error::{StorageError, StorageResult};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Decides when the indexing loop must flush the MemTable
///
/// A lower threshold means more, smaller segments; a higher one means more
/// buffered rows that an unclean shutdown can lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    threshold: usize,
}

impl FlushPolicy {
    pub fn new(threshold: usize) -> StorageResult<Self> {
        if threshold == 0 {
            return Err(StorageError::Config(
                "flush threshold must be greater than zero".into(),
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Evaluated after every append
    pub fn should_flush(&self, size: usize) -> bool {
        size >= self.threshold
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}
