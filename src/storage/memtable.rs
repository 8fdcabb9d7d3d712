//! MemTable: the mutable write buffer
//!
//! Events are pivoted into a columnar [`Block`] as they arrive and stay in
//! memory until the indexer flushes them as one immutable segment.
//!
//! There is no write-ahead log behind the buffer. Rows are durable once
//! their segment is written; a crash before that loses them.
//!
//! `flush` never clears the buffer. The owner decides what happens after a
//! successful write (usually [`MemTable::freeze`] before flushing and
//! dropping the frozen table afterwards), which keeps a failed flush
//! trivially retryable.

use crate::storage::backend::BlobBackend;
use crate::storage::compression::{compression_stats, encode_block};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::segment::SegmentKeyGenerator;
use crate::storage::types::{Block, Event};

/// Single-writer columnar buffer
#[derive(Debug, Default)]
pub struct MemTable {
    block: Block,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            block: Block::with_capacity(capacity),
        }
    }

    /// Append an event; cannot fail
    pub fn add(&mut self, event: Event) {
        self.block.push(event);
    }

    /// Current row count
    pub fn size(&self) -> usize {
        self.block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Take the buffered rows, leaving an empty table in their place
    pub fn freeze(&mut self) -> MemTable {
        std::mem::take(self)
    }

    /// Put rows back after a failed flush, ahead of anything appended since
    pub fn restore(&mut self, mut frozen: MemTable) {
        let newer = std::mem::take(&mut self.block);
        frozen.block.extend(newer);
        self.block = frozen.block;
    }

    /// Write the buffered rows as a new segment
    ///
    /// Returns `None` without touching the backend when the table is empty,
    /// otherwise the key of the segment that was written. The buffer is left
    /// as is either way.
    pub async fn flush(
        &self,
        backend: &dyn BlobBackend,
        keys: &mut SegmentKeyGenerator,
    ) -> StorageResult<Option<String>> {
        if self.is_empty() {
            return Ok(None);
        }

        let compression = keys.compression();
        let data = encode_block(&self.block, compression).map_err(into_flush_error)?;
        let stats = compression_stats(&self.block, &data);
        let key = keys.next_key().to_string();

        backend
            .put(&key, data, compression.content_type())
            .await
            .map_err(into_flush_error)?;

        tracing::debug!(
            key = %key,
            rows = stats.row_count,
            bytes = stats.compressed_size,
            ratio = stats.ratio,
            "Segment written"
        );

        Ok(Some(key))
    }
}

fn into_flush_error(err: StorageError) -> StorageError {
    match err {
        StorageError::Flush(_) => err,
        other => StorageError::Flush(other.to_string()),
    }
}
