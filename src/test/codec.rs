use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::compress::CompressedBlob;
use crate::compress::EntryCodec;
use crate::compress::RecordCompressor;
use crate::error::DaoError;
use crate::error::Result;
use crate::test::record::FareRule;

/// [`RecordCompressor`] whose next few decodes fail as if the blob were corrupted.
pub struct FlakyCodec {
    inner:    RecordCompressor<FareRule>,
    failures: AtomicUsize,
    decodes:  AtomicUsize,
}

impl FlakyCodec {
    pub fn new(failures: usize) -> Self {
        Self {
            inner:    RecordCompressor::new().with_min_records(1),
            failures: AtomicUsize::new(failures),
            decodes:  AtomicUsize::new(0),
        }
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl EntryCodec<FareRule> for FlakyCodec {
    fn min_records(&self) -> usize {
        self.inner.min_records()
    }

    fn compress(&self, records: &[FareRule]) -> Result<CompressedBlob> {
        self.inner.compress(records)
    }

    fn uncompress(&self, blob: &CompressedBlob) -> Result<Vec<FareRule>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DaoError::Compression {
                operation: "uncompress",
                reason:    "corrupted blob".to_string(),
            });
        }
        self.inner.uncompress(blob)
    }
}
