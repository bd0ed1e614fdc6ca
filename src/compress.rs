//! Transparent compression of cache entries.
//!
//! A [`KeyedCache`](crate::KeyedCache) may be given an [`EntryCodec`]. Entries at least
//! [`min_records()`](EntryCodec::min_records) long are then kept as an opaque blob and decoded on every access;
//! smaller ones stay plain. Callers can't tell the difference.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::DaoError;
use crate::error::Result;

/// Compressed form of a record collection.
#[derive(Clone, PartialEq, Eq)]
pub struct CompressedBlob {
    data:    Box<[u8]>,
    records: usize,
}

impl CompressedBlob {
    pub fn new(data: Vec<u8>, records: usize) -> Self {
        Self {
            data: data.into_boxed_slice(),
            records,
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of records encoded in the blob.
    #[inline]
    pub fn records(&self) -> usize {
        self.records
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Debug for CompressedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedBlob")
            .field("records", &self.records)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub trait EntryCodec<R>: Send + Sync + 'static {
    /// Entries shorter than this are not worth compressing.
    fn min_records(&self) -> usize {
        0
    }

    fn compress(&self, records: &[R]) -> Result<CompressedBlob>;
    fn uncompress(&self, blob: &CompressedBlob) -> Result<Vec<R>>;
}

/// `postcard` serialization followed by LZ4 block compression with a size prefix.
pub struct RecordCompressor<R> {
    level:       i32,
    min_records: usize,
    _records:    PhantomData<fn() -> R>,
}

impl<R> RecordCompressor<R> {
    pub fn new() -> Self {
        Self {
            level:       4,
            min_records: 32,
            _records:    PhantomData,
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn with_min_records(mut self, min_records: usize) -> Self {
        self.min_records = min_records;
        self
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl<R> Default for RecordCompressor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Debug for RecordCompressor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCompressor")
            .field("level", &self.level)
            .field("min_records", &self.min_records)
            .finish()
    }
}

impl<R> EntryCodec<R> for RecordCompressor<R>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn min_records(&self) -> usize {
        self.min_records
    }

    fn compress(&self, records: &[R]) -> Result<CompressedBlob> {
        if records.is_empty() {
            return Ok(CompressedBlob::new(Vec::new(), 0));
        }

        let raw = postcard::to_allocvec(records).map_err(|e| compression_error("serialize", e))?;
        let packed = lz4::block::compress(
            &raw,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| compression_error("compress", e))?;

        Ok(CompressedBlob::new(packed, records.len()))
    }

    fn uncompress(&self, blob: &CompressedBlob) -> Result<Vec<R>> {
        if blob.records() == 0 && blob.size() == 0 {
            return Ok(Vec::new());
        }

        let raw = lz4::block::decompress(blob.data(), None).map_err(|e| compression_error("uncompress", e))?;
        let records: Vec<R> = postcard::from_bytes(&raw).map_err(|e| compression_error("deserialize", e))?;

        if records.len() != blob.records() {
            return Err(DaoError::Compression {
                operation: "uncompress",
                reason:    format!("expected {} records, decoded {}", blob.records(), records.len()),
            });
        }

        Ok(records)
    }
}

fn compression_error(operation: &'static str, err: impl ToString) -> DaoError {
    DaoError::Compression {
        operation,
        reason: err.to_string(),
    }
}
