//! Request-scoped record of cache data in use.
//!
//! A [`ScopedBorrow`] is created at the start of a pricing request and passed into every DAO `get`. It keeps two
//! kinds of things alive until the request ends:
//!
//! - shared handles to whole cache entries the request looked at, so a concurrent `clear()` can't pull the data
//!   from under the request;
//! - request-owned copies produced when only some records of an entry passed the filter, or when an entry had to be
//!   decoded.
//!
//! Dropping the borrow releases each adopted copy once and merely decrements the reference count of every shared
//! entry. Nothing held by the cache itself is ever freed from here.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::entry::CacheEntry;

#[derive(Default)]
pub struct ScopedBorrow {
    shared:  Vec<Arc<dyn Any + Send + Sync>>,
    // Addresses of the entries in `shared`.
    holding: HashSet<usize>,
    owned:   Vec<Box<dyn Any + Send + Sync>>,
}

impl ScopedBorrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a shared cache entry alive for the rest of the request. Registering the same entry again is a no-op;
    /// returns `false` in that case.
    pub fn copy<R>(&mut self, entry: &Arc<CacheEntry<R>>) -> bool
    where
        R: Send + Sync + 'static,
    {
        if !self.holding.insert(entry_addr(entry)) {
            return false;
        }
        self.shared.push(Arc::clone(entry) as Arc<dyn Any + Send + Sync>);
        true
    }

    /// Take ownership of records allocated for this request only. The returned handle stays valid after the borrow
    /// is gone, but the borrow is what owns the copy for the request's lifetime.
    pub fn adopt<R>(&mut self, records: Vec<R>) -> Arc<[R]>
    where
        R: Send + Sync + 'static,
    {
        let records: Arc<[R]> = records.into();
        self.owned.push(Box::new(Arc::clone(&records)));
        records
    }

    /// Number of distinct shared entries registered.
    pub fn shared_len(&self) -> usize {
        self.shared.len()
    }

    /// Number of adopted request-owned copies.
    pub fn owned_len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.owned.is_empty()
    }

    /// Whether `entry` has been registered with [`copy()`](Self::copy).
    pub fn holds<R>(&self, entry: &Arc<CacheEntry<R>>) -> bool
    where
        R: Send + Sync + 'static,
    {
        self.holding.contains(&entry_addr(entry))
    }
}

#[inline]
fn entry_addr<R>(entry: &Arc<CacheEntry<R>>) -> usize {
    Arc::as_ptr(entry) as usize
}

impl Debug for ScopedBorrow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedBorrow")
            .field("shared", &self.shared.len())
            .field("owned", &self.owned.len())
            .finish()
    }
}

impl Drop for ScopedBorrow {
    fn drop(&mut self) {
        if !self.is_empty() {
            tracing::trace!(
                shared = self.shared.len(),
                owned = self.owned.len(),
                "releasing scoped borrow"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_is_deduplicated() {
        let entry = Arc::new(CacheEntry::plain(vec![1u32, 2, 3]));
        let mut borrow = ScopedBorrow::new();
        assert!(borrow.copy(&entry));
        assert!(!borrow.copy(&entry));
        assert_eq!(borrow.shared_len(), 1);
        assert!(borrow.holds(&entry));
        assert_eq!(Arc::strong_count(&entry), 2);
    }

    #[test]
    fn many_entries_are_each_held_once() {
        let entries: Vec<_> = (0..500u32).map(|i| Arc::new(CacheEntry::plain(vec![i]))).collect();
        let mut borrow = ScopedBorrow::new();
        for entry in entries.iter().chain(entries.iter()) {
            borrow.copy(entry);
        }
        assert_eq!(borrow.shared_len(), entries.len());
        assert!(entries.iter().all(|e| borrow.holds(e) && Arc::strong_count(e) == 2));

        let stranger = Arc::new(CacheEntry::plain(vec![0u32]));
        assert!(!borrow.holds(&stranger));
    }

    #[test]
    fn drop_releases_only_what_it_holds() {
        let entry = Arc::new(CacheEntry::plain(vec!["a".to_string(), "b".to_string()]));
        let copy;
        {
            let mut borrow = ScopedBorrow::new();
            borrow.copy(&entry);
            copy = Arc::downgrade(&borrow.adopt(vec!["b".to_string()]));
            assert!(copy.upgrade().is_some());
            assert_eq!(borrow.owned_len(), 1);
        }
        assert_eq!(Arc::strong_count(&entry), 1);
        assert_eq!(entry.len(), 2);
        assert!(copy.upgrade().is_none());
    }
}
