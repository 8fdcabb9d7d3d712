//! Segment codec for Chronos storage
//!
//! A block is written as a self-describing JSON document with one named
//! array per column, then passed through a lossless stream compressor:
//!
//! ```text
//! {"ids":[..],"timestamps":[..],"sources":[..],"messages":[..]}  →  gzip | lz4
//! ```
//!
//! The compressor is recorded in the segment key suffix (`.json.gz` or
//! `.json.lz4`), so readers pick the decoder from the key alone.
//!
//! Every decode failure (bad compressed stream, malformed document, ragged
//! columns) surfaces as [`StorageError::Decode`]. Whether to retry or skip is
//! left to the caller.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::Block;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Stream compressor applied to the encoded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentCompression {
    #[default]
    Gzip,
    Lz4,
}

impl SegmentCompression {
    /// Format + compression suffix used in segment keys
    pub fn suffix(&self) -> &'static str {
        match self {
            SegmentCompression::Gzip => "json.gz",
            SegmentCompression::Lz4 => "json.lz4",
        }
    }

    /// Content type for object store uploads
    pub fn content_type(&self) -> &'static str {
        match self {
            SegmentCompression::Gzip => "application/gzip",
            SegmentCompression::Lz4 => "application/octet-stream",
        }
    }

    pub fn all() -> &'static [SegmentCompression] {
        &[SegmentCompression::Gzip, SegmentCompression::Lz4]
    }

    /// Detect the compression from a key's suffix
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| key.ends_with(&format!(".{}", c.suffix())))
    }
}

impl std::fmt::Display for SegmentCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentCompression::Gzip => write!(f, "gzip"),
            SegmentCompression::Lz4 => write!(f, "lz4"),
        }
    }
}

/// Borrowed view used when encoding, so the block is never cloned
#[derive(Serialize)]
struct SegmentDocumentRef<'a> {
    ids: &'a [String],
    timestamps: &'a [i64],
    sources: &'a [String],
    messages: &'a [String],
}

#[derive(Deserialize)]
struct SegmentDocument {
    ids: Vec<String>,
    timestamps: Vec<i64>,
    sources: Vec<String>,
    messages: Vec<String>,
}

/// Encode a block into compressed segment bytes
pub fn encode_block(block: &Block, compression: SegmentCompression) -> StorageResult<Vec<u8>> {
    let document = SegmentDocumentRef {
        ids: block.ids(),
        timestamps: block.timestamps(),
        sources: block.sources(),
        messages: block.messages(),
    };

    let serialized = serde_json::to_vec(&document)
        .map_err(|e| StorageError::Flush(format!("Failed to encode block: {}", e)))?;

    match compression {
        SegmentCompression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&serialized)?;
            Ok(encoder.finish()?)
        }
        SegmentCompression::Lz4 => Ok(lz4_flex::compress_prepend_size(&serialized)),
    }
}

/// Decode compressed segment bytes back into a block
pub fn decode_block(data: &[u8], compression: SegmentCompression) -> StorageResult<Block> {
    let decompressed = match compression {
        SegmentCompression::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut buf = Vec::with_capacity(data.len() * 4);
            decoder
                .read_to_end(&mut buf)
                .map_err(|e| StorageError::Decode(format!("gzip decompression failed: {}", e)))?;
            buf
        }
        SegmentCompression::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| StorageError::Decode(format!("LZ4 decompression failed: {}", e)))?,
    };

    let document: SegmentDocument = serde_json::from_slice(&decompressed)
        .map_err(|e| StorageError::Decode(format!("malformed segment document: {}", e)))?;

    Block::from_columns(
        document.ids,
        document.timestamps,
        document.sources,
        document.messages,
    )
    .map_err(StorageError::Decode)
}

/// Decode a segment, choosing the decompressor from its key
pub fn decode_segment(key: &str, data: &[u8]) -> StorageResult<Block> {
    let compression = SegmentCompression::from_key(key).ok_or_else(|| {
        StorageError::Decode(format!("unknown segment format for key {}", key))
    })?;
    decode_block(data, compression)
}

/// Compression statistics for a block
#[derive(Debug)]
pub struct CompressionStats {
    /// Number of rows
    pub row_count: usize,
    /// Size of the uncompressed column data (bytes)
    pub original_size: usize,
    /// Compressed size (bytes)
    pub compressed_size: usize,
    /// Compression ratio (original / compressed)
    pub ratio: f64,
}

/// Calculate compression statistics
pub fn compression_stats(block: &Block, compressed: &[u8]) -> CompressionStats {
    let original_size: usize = block.ids().iter().map(String::len).sum::<usize>()
        + block.timestamps().len() * std::mem::size_of::<i64>()
        + block.sources().iter().map(String::len).sum::<usize>()
        + block.messages().iter().map(String::len).sum::<usize>();
    let compressed_size = compressed.len();
    let ratio = if compressed_size > 0 {
        original_size as f64 / compressed_size as f64
    } else {
        0.0
    };

    CompressionStats {
        row_count: block.len(),
        original_size,
        compressed_size,
        ratio,
    }
}
