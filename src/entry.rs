use chrono::DateTime;
use chrono::Utc;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use crate::compress::CompressedBlob;

pub(crate) enum Storage<R> {
    Plain(Arc<[R]>),
    Compressed(CompressedBlob),
}

/// Records loaded for one key. Published once and never modified afterwards; a reload replaces the entry as a
/// whole.
pub struct CacheEntry<R> {
    storage:   Storage<R>,
    len:       usize,
    loaded_at: DateTime<Utc>,
}

impl<R> CacheEntry<R> {
    pub(crate) fn plain(records: Vec<R>) -> Self {
        let len = records.len();
        Self {
            storage: Storage::Plain(records.into()),
            len,
            loaded_at: Utc::now(),
        }
    }

    pub(crate) fn compressed(blob: CompressedBlob) -> Self {
        Self {
            len:       blob.records(),
            storage:   Storage::Compressed(blob),
            loaded_at: Utc::now(),
        }
    }

    pub(crate) fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.storage, Storage::Compressed(_))
    }

    /// Shared handle to the records unless the entry is kept compressed.
    pub fn shared_records(&self) -> Option<Arc<[R]>> {
        match self.storage {
            Storage::Plain(ref records) => Some(Arc::clone(records)),
            Storage::Compressed(_) => None,
        }
    }

    pub fn compressed_size(&self) -> Option<usize> {
        match self.storage {
            Storage::Plain(_) => None,
            Storage::Compressed(ref blob) => Some(blob.size()),
        }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl<R> Debug for CacheEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("len", &self.len)
            .field("compressed", &self.is_compressed())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Where the records of an [`EffectiveView`] come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrigin {
    /// The cache entry itself, nothing was copied.
    Shared,
    /// A request-owned copy holding the records that passed the filter.
    Filtered,
    /// A request-owned copy decoded from a compressed entry.
    Decoded,
}

/// Answer of a DAO `get`. Dereferences to the selected records.
pub struct EffectiveView<R> {
    records: Arc<[R]>,
    origin:  ViewOrigin,
}

impl<R> EffectiveView<R> {
    pub(crate) fn new(records: Arc<[R]>, origin: ViewOrigin) -> Self {
        Self { records, origin }
    }

    #[inline]
    pub fn origin(&self) -> ViewOrigin {
        self.origin
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.origin == ViewOrigin::Shared
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Whether both views look at the same memory.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

impl<R> Clone for EffectiveView<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            origin:  self.origin,
        }
    }
}

impl<R> Deref for EffectiveView<R> {
    type Target = [R];

    fn deref(&self) -> &[R] {
        &self.records
    }
}

impl<'a, R> IntoIterator for &'a EffectiveView<R> {
    type IntoIter = std::slice::Iter<'a, R>;
    type Item = &'a R;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl<R: Debug> Debug for EffectiveView<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveView")
            .field("origin", &self.origin)
            .field("records", &&*self.records)
            .finish()
    }
}
