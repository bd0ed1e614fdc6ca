use crate::compress::EntryCodec;
use crate::entry::CacheEntry;
use crate::entry::Storage;
use crate::error::DaoError;
use crate::error::Result;
use crate::error::SharedSource;
use crate::traits::Loader;
use crate::types::CacheClass;
use fieldx::fxstruct;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

type EntryMap<L> = Cache<<L as Loader>::Key, Arc<CacheEntry<<L as Loader>::Record>>>;

// What may go wrong while an entry is being populated. Both kinds are shared among all the callers waiting on the
// same key.
enum LoadFailure<E> {
    Loader(E),
    Codec(DaoError),
}

impl<E> LoadFailure<E> {
    fn operation(&self) -> &'static str {
        match self {
            Self::Loader(_) => "load",
            Self::Codec(_) => "compress",
        }
    }
}

impl<E: Debug> Debug for LoadFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loader(e) => f.debug_tuple("LoadFailure::Loader").field(e).finish(),
            Self::Codec(e) => f.debug_tuple("LoadFailure::Codec").field(e).finish(),
        }
    }
}

impl<E: Display> Display for LoadFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loader(e) => Display::fmt(e, f),
            Self::Codec(e) => Display::fmt(e, f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for LoadFailure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Loader(e) => Some(e),
            Self::Codec(e) => Some(e),
        }
    }
}

/// Single-flight keyed cache in front of a [`Loader`].
///
/// ```ignore
/// let cache = KeyedCache::builder()
///     .loader(FareRuleLoader::new(pool))
///     .name("fare_rules")
///     .cache_class(CacheClass::Rules)
///     .max_capacity(100_000)
///     .build()?;
///
/// // The first caller for a key runs the loader, everybody else racing for the same key waits for its outcome.
/// let entry = cache.get(&FareKey::new("ATP", 1234)).await?;
/// ```
#[fxstruct(
    sync,
    no_new,
    default(off),
    builder(
        doc("Builder object of [`KeyedCache`].", "", "See [`KeyedCache::builder()`] method."),
        method_doc("Implement builder pattern for [`KeyedCache`]."),
    )
)]
pub struct KeyedCache<L>
where
    L: Loader,
{
    #[fieldx(vis(pub), builder(required, into), get(clone))]
    loader: Arc<L>,

    /// Cache name. Most useful for debugging and logging.
    #[fieldx(get(copy), default("anonymous"))]
    name: &'static str,

    #[fieldx(get(copy), default(CacheClass::Common))]
    cache_class: CacheClass,

    #[fieldx(get(copy), default(10_000))]
    max_capacity: u64,

    /// When set, entries of at least `min_records()` records are kept compressed.
    #[fieldx(get(clone), default(None))]
    codec: Option<Arc<dyn EntryCodec<L::Record>>>,

    // Dropped as a whole on clear(); the next access starts a new generation.
    #[fieldx(vis(pub(crate)), lazy, lock, clearer(private), get(clone), builder(off))]
    cache: Arc<EntryMap<L>>,
}

impl<L> KeyedCacheBuilder<L>
where
    L: Loader,
{
    /// Store entries compressed with the given codec.
    pub fn compressed_with<C>(self, codec: C) -> Self
    where
        C: EntryCodec<L::Record>,
    {
        self.codec(Some(Arc::new(codec) as Arc<dyn EntryCodec<L::Record>>))
    }
}

impl<L> KeyedCache<L>
where
    L: Loader,
{
    fn build_cache(&self) -> Arc<EntryMap<L>> {
        Arc::new(
            Cache::builder()
                .max_capacity(self.max_capacity())
                .name(self.name())
                .eviction_policy(EvictionPolicy::tiny_lfu())
                .build(),
        )
    }

    /// Return the entry for `key`, loading it if needed.
    ///
    /// Only one caller per key performs the load; all concurrent callers for the same key receive the same entry or
    /// the same error. A failed load publishes nothing, so the next call retries.
    #[instrument(level = "trace", skip(self), fields(cache = self.name()))]
    pub async fn get(&self, key: &L::Key) -> Result<Arc<CacheEntry<L::Record>>> {
        tracing::debug!("[{}] GET({key})", self.name());

        self.cache()
            .try_get_with(key.clone(), self.load_entry(key))
            .await
            .map_err(|err| {
                let operation = err.operation();
                DaoError::backing_store(operation, key, err as SharedSource)
            })
    }

    async fn load_entry(&self, key: &L::Key) -> Result<Arc<CacheEntry<L::Record>>, LoadFailure<L::Error>> {
        let started = Instant::now();

        let records = self.loader().load(key).await.map_err(|err| {
            tracing::error!("[{}] LOAD({key}) failed: {err}", self.name());
            LoadFailure::Loader(err)
        })?;

        tracing::debug!(
            "[{}] LOAD({key}) produced {} record(s) in {:?}",
            self.name(),
            records.len(),
            started.elapsed()
        );

        self.make_entry(records).map(Arc::new).map_err(|err| {
            tracing::error!("[{}] LOAD({key}) could not be stored: {err}", self.name());
            LoadFailure::Codec(err)
        })
    }

    pub(crate) fn make_entry(&self, records: Vec<L::Record>) -> Result<CacheEntry<L::Record>> {
        match self.codec() {
            Some(codec) if !records.is_empty() && records.len() >= codec.min_records() => {
                Ok(CacheEntry::compressed(codec.compress(&records)?))
            }
            _ => Ok(CacheEntry::plain(records)),
        }
    }

    /// Decode a compressed entry. Plain entries are simply copied out.
    pub fn decode(&self, entry: &CacheEntry<L::Record>) -> Result<Vec<L::Record>> {
        match entry.storage() {
            Storage::Plain(records) => Ok(records.to_vec()),
            Storage::Compressed(blob) => {
                let Some(codec) = self.codec()
                else {
                    return Err(DaoError::Compression {
                        operation: "uncompress",
                        reason:    format!("cache '{}' has no codec for a compressed entry", self.name()),
                    });
                };
                codec.uncompress(blob)
            }
        }
    }

    /// Return the entry for `key` only if it is already cached.
    pub async fn get_if_present(&self, key: &L::Key) -> Option<Arc<CacheEntry<L::Record>>> {
        self.cache().get(key).await
    }

    pub fn contains_key(&self, key: &L::Key) -> bool {
        self.cache().contains_key(key)
    }

    /// Publish records for `key` directly, bypassing the loader. Replaces any existing entry wholesale.
    pub async fn insert(&self, key: L::Key, records: Vec<L::Record>) -> Result<Arc<CacheEntry<L::Record>>> {
        let entry = Arc::new(self.make_entry(records)?);
        self.publish(key, Arc::clone(&entry)).await;
        Ok(entry)
    }

    pub(crate) async fn publish(&self, key: L::Key, entry: Arc<CacheEntry<L::Record>>) {
        tracing::debug!("[{}] INSERT({key}) {} record(s)", self.name(), entry.len());
        self.cache().insert(key, entry).await;
    }

    #[inline]
    pub async fn invalidate(&self, key: &L::Key) {
        tracing::debug!("[{}] INVALIDATE({key})", self.name());
        self.cache().invalidate(key).await;
    }

    /// Evict everything. Requests still holding entries keep them until they are done with them.
    pub fn clear(&self) {
        if let Some(previous) = self.clear_cache() {
            tracing::info!("Clearing {} cache; count={}", self.name(), previous.entry_count());
        }
    }

    /// Approximate number of cached keys. Call [`run_pending_tasks()`](Self::run_pending_tasks) first for an exact
    /// figure.
    pub fn entry_count(&self) -> u64 {
        self.cache().entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache().run_pending_tasks().await;
    }

    pub fn keys(&self) -> Vec<L::Key> {
        self.cache().iter().map(|(key, _)| (*key).clone()).collect()
    }
}

impl<L> Debug for KeyedCache<L>
where
    L: Loader,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCache")
            .field("name", &self.name())
            .field("cache_class", &self.cache_class())
            .field("max_capacity", &self.max_capacity())
            .field("compressed", &self.codec().is_some())
            .finish()
    }
}
