//! Data access objects: a [`KeyedCache`] paired with a [`ViewStrategy`].
//!
//! The same generic [`Dao`] serves both the current view ([`CurrentDao`]) and the historical view
//! ([`HistoricalDao`]). Per entity only the loader and the key type differ.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::instrument;

use crate::borrow::ScopedBorrow;
use crate::bulk::BulkLoadReport;
use crate::bulk::StartupLoader;
use crate::cache::KeyedCache;
use crate::config::DaoSettings;
use crate::entry::CacheEntry;
use crate::entry::EffectiveView;
use crate::entry::ViewOrigin;
use crate::error::DaoError;
use crate::error::Result;
use crate::predicates::select;
use crate::predicates::Predicate;
use crate::predicates::Selected;
use crate::strategy::CurrentView;
use crate::strategy::HistoricalKey;
use crate::strategy::HistoricalView;
use crate::strategy::ViewStrategy;
use crate::traits::EffectiveDated;
use crate::traits::KeyAttributes;
use crate::traits::Loader;
use crate::types::AttrBag;
use crate::types::CacheClass;
use crate::types::CacheKey;
use crate::types::Date;
use crate::types::FallbackPolicy;
use crate::types::QueryDates;

pub type CurrentDao<K, L> = Dao<K, L, CurrentView>;
pub type HistoricalDao<K, L> = Dao<K, L, HistoricalView>;

pub struct Dao<K, L, S = CurrentView>
where
    K: CacheKey,
    S: ViewStrategy<K>,
    L: Loader<Key = S::CacheKey>,
    L::Record: EffectiveDated,
{
    cache:    Arc<KeyedCache<L>>,
    strategy: S,
    resident: bool,
    _key:     PhantomData<fn(&K)>,
}

impl<K, L, S> Dao<K, L, S>
where
    K: CacheKey,
    S: ViewStrategy<K>,
    L: Loader<Key = S::CacheKey>,
    L::Record: EffectiveDated,
{
    pub fn new(cache: Arc<KeyedCache<L>>, strategy: S) -> Self {
        Self {
            cache,
            strategy,
            resident: false,
            _key: PhantomData,
        }
    }

    /// Mark the DAO as always resident: it is bulk loaded at startup and reloaded right after every clear.
    pub fn resident(mut self, resident: bool) -> Self {
        self.resident = resident;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.cache.name()
    }

    #[inline]
    pub fn cache_class(&self) -> CacheClass {
        self.cache.cache_class()
    }

    #[inline]
    pub fn cache(&self) -> &Arc<KeyedCache<L>> {
        &self.cache
    }

    #[inline]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    #[inline]
    pub fn is_resident(&self) -> bool {
        self.resident
    }

    /// Records for `key` selected as of `date`.
    ///
    /// When every record of the cached entry qualifies, the entry itself is handed out and registered with
    /// `borrow`. Otherwise the qualifying records are copied, the copy is adopted by `borrow`, and the entry stays
    /// untouched.
    pub async fn get(&self, key: &K, date: Date, borrow: &mut ScopedBorrow) -> Result<EffectiveView<L::Record>> {
        self.select(key, QueryDates::on(date), borrow).await
    }

    /// Same as [`get()`](Self::get) but with a travel date distinct from the ticket date. Only makes a difference
    /// for strategies using [`Selection::Effective`](crate::types::Selection::Effective).
    pub async fn get_on(
        &self,
        key: &K,
        ticket_date: Date,
        travel_date: Date,
        borrow: &mut ScopedBorrow,
    ) -> Result<EffectiveView<L::Record>> {
        self.select(key, QueryDates::new(ticket_date, travel_date), borrow).await
    }

    #[instrument(level = "trace", skip(self, borrow), fields(dao = self.name()))]
    pub async fn select(
        &self,
        key: &K,
        dates: QueryDates,
        borrow: &mut ScopedBorrow,
    ) -> Result<EffectiveView<L::Record>> {
        let cache_key = self.strategy.cache_key(key, dates);
        let predicate = self.strategy.predicate(&cache_key, dates);
        let entry = self.cache.get(&cache_key).await?;

        if let Some(records) = entry.shared_records() {
            return Ok(match select(&records, &predicate) {
                Selected::All => {
                    borrow.copy(&entry);
                    EffectiveView::new(records, ViewOrigin::Shared)
                }
                Selected::Subset(subset) => EffectiveView::new(borrow.adopt(subset), ViewOrigin::Filtered),
            });
        }

        let mut records = self.decode_or_reload(&cache_key, entry).await?;
        records.retain(|r| predicate.test(r));
        Ok(EffectiveView::new(borrow.adopt(records), ViewOrigin::Decoded))
    }

    // A blob that can't be decoded is treated as bad data from the backing store: drop it and load again.
    async fn decode_or_reload(
        &self,
        cache_key: &S::CacheKey,
        entry: Arc<CacheEntry<L::Record>>,
    ) -> Result<Vec<L::Record>> {
        match self.cache.decode(&entry) {
            Ok(records) => Ok(records),
            Err(err) => {
                tracing::warn!("[{}] cannot decode entry for {cache_key}, reloading: {err}", self.name());
                self.cache.invalidate(cache_key).await;
                let fresh = self.cache.get(cache_key).await?;
                self.cache
                    .decode(&fresh)
                    .map_err(|err| DaoError::backing_store("uncompress", cache_key, Arc::new(err)))
            }
        }
    }

    /// Like [`get()`](Self::get) but an empty answer is reported as [`DaoError::NotFound`].
    pub async fn get_required(
        &self,
        key: &K,
        date: Date,
        borrow: &mut ScopedBorrow,
    ) -> Result<EffectiveView<L::Record>> {
        let view = self.get(key, date, borrow).await?;
        if view.is_empty() {
            return Err(DaoError::NotFound { key: key.to_string() });
        }
        Ok(view)
    }

    /// The first selected record in loader order.
    pub async fn get_first(&self, key: &K, date: Date, borrow: &mut ScopedBorrow) -> Result<Option<L::Record>> {
        Ok(self.get(key, date, borrow).await?.first().cloned())
    }

    pub async fn get_first_where<F>(
        &self,
        key: &K,
        date: Date,
        borrow: &mut ScopedBorrow,
        accept: F,
    ) -> Result<Option<L::Record>>
    where
        F: Fn(&L::Record) -> bool + Send,
    {
        Ok(self.get(key, date, borrow).await?.iter().find(|r| accept(r)).cloned())
    }

    /// The smallest selected record according to `cmp`; on ties the earliest one wins.
    pub async fn get_best_by<F>(
        &self,
        key: &K,
        date: Date,
        borrow: &mut ScopedBorrow,
        cmp: F,
    ) -> Result<Option<L::Record>>
    where
        F: Fn(&L::Record, &L::Record) -> Ordering + Send,
    {
        Ok(self.get(key, date, borrow).await?.iter().min_by(|a, b| cmp(a, b)).cloned())
    }

    pub async fn get_first_or_default(&self, key: &K, date: Date, borrow: &mut ScopedBorrow) -> Result<L::Record>
    where
        L::Record: Default,
    {
        Ok(self.get_first(key, date, borrow).await?.unwrap_or_default())
    }

    /// Derive the cache key a freshly loaded record belongs to.
    pub fn create_key(&self, record: &L::Record) -> Option<L::Key> {
        self.cache.loader().create_key(record)
    }

    /// Populate the whole cache in one pass, bypassing on-demand loading.
    pub async fn load_resident(&self) -> Result<BulkLoadReport> {
        StartupLoader::new(&self.cache).run().await
    }

    /// Evict everything; resident DAOs are reloaded immediately.
    pub async fn clear(&self) -> Result<()> {
        self.cache.clear();
        if self.resident {
            self.load_resident().await?;
        }
        Ok(())
    }

    pub async fn invalidate(&self, cache_key: &S::CacheKey) {
        self.cache.invalidate(cache_key).await;
    }

    /// Administrative override of a whole entry.
    pub async fn insert_override(&self, cache_key: S::CacheKey, records: Vec<L::Record>) -> Result<()> {
        tracing::info!("[{}] overriding entry {cache_key} with {} record(s)", self.name(), records.len());
        self.cache.insert(cache_key, records).await?;
        Ok(())
    }

    pub fn cached_keys(&self) -> Vec<S::CacheKey> {
        self.cache.keys()
    }
}

impl<K, L, S> Dao<K, L, S>
where
    K: CacheKey,
    S: ViewStrategy<K>,
    L: Loader<Key = S::CacheKey>,
    L::Record: EffectiveDated,
    S::CacheKey: KeyAttributes,
{
    /// Invalidate the entry addressed by an attribute bag. A bag which doesn't translate into a key never reaches
    /// the cache.
    pub async fn invalidate_attrs(&self, attrs: &AttrBag) -> Result<()> {
        let cache_key = S::CacheKey::from_attrs(attrs)?;
        self.cache.invalidate(&cache_key).await;
        Ok(())
    }

    pub fn cached_key_attrs(&self) -> Vec<AttrBag> {
        self.cached_keys().iter().map(KeyAttributes::to_attrs).collect()
    }
}

impl<K, L> Dao<K, L, CurrentView>
where
    K: CacheKey,
    L: Loader<Key = K>,
    L::Record: EffectiveDated + Serialize + DeserializeOwned,
{
    /// Build a current-view DAO from settings.
    pub fn from_settings(name: &'static str, loader: L, settings: &DaoSettings) -> Result<Self> {
        let cache = settings.build_cache(name, loader)?;
        Ok(Self::new(Arc::new(cache), CurrentView::new(settings.selection)).resident(settings.resident))
    }
}

impl<K, L> Dao<K, L, HistoricalView>
where
    K: CacheKey,
    L: Loader<Key = HistoricalKey<K>>,
    L::Record: EffectiveDated,
{
    /// Query as of the rule application date and, depending on `policy`, fall back to the ticket date when that
    /// yields nothing. Errors are never retried with the other date.
    pub async fn get_as_of(
        &self,
        key: &K,
        application_date: Option<Date>,
        ticket_date: Date,
        policy: FallbackPolicy,
        borrow: &mut ScopedBorrow,
    ) -> Result<EffectiveView<L::Record>> {
        if let Some(application_date) = application_date.filter(|d| *d != ticket_date) {
            let view = self.get(key, application_date, borrow).await?;
            if !view.is_empty() || policy == FallbackPolicy::Never {
                return Ok(view);
            }
            tracing::debug!(
                "[{}] nothing for {key} as of {application_date}, falling back to ticket date {ticket_date}",
                self.name()
            );
        }
        self.get(key, ticket_date, borrow).await
    }
}

impl<K, L> Dao<K, L, HistoricalView>
where
    K: CacheKey,
    L: Loader<Key = HistoricalKey<K>>,
    L::Record: EffectiveDated + Serialize + DeserializeOwned,
{
    /// Build a historical DAO from settings; the bucket granularity comes from the settings too.
    pub fn from_settings(name: &'static str, loader: L, settings: &DaoSettings) -> Result<Self> {
        let cache = settings.build_cache(name, loader)?;
        let strategy = HistoricalView::new(settings.granularity).with_selection(settings.selection);
        Ok(Self::new(Arc::new(cache), strategy).resident(settings.resident))
    }
}

impl<K, L, S> Debug for Dao<K, L, S>
where
    K: CacheKey,
    S: ViewStrategy<K> + Debug,
    L: Loader<Key = S::CacheKey>,
    L::Record: EffectiveDated,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("cache", &self.cache)
            .field("strategy", &self.strategy)
            .field("resident", &self.resident)
            .finish()
    }
}
