//! Process-wide registry of DAOs.
//!
//! The registry is assembled once at startup and installed under a one-time initialization barrier. From then on it
//! is only ever handed out as a shared reference. Administrative actions (clearing, resident reloads, key inspection)
//! go through the object-safe [`CacheAdmin`] trait; request code gets its typed DAO back with
//! [`DaoRegistry::get()`].

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::bulk::BulkLoadReport;
use crate::dao::Dao;
use crate::error::DaoError;
use crate::error::Result;
use crate::strategy::ViewStrategy;
use crate::traits::EffectiveDated;
use crate::traits::KeyAttributes;
use crate::traits::Loader;
use crate::types::AttrBag;
use crate::types::CacheClass;
use crate::types::CacheKey;

static REGISTRY: OnceCell<DaoRegistry> = OnceCell::new();

/// Type-erased administrative view of a DAO.
#[async_trait]
pub trait CacheAdmin: Any + Send + Sync {
    fn name(&self) -> &'static str;
    fn cache_class(&self) -> CacheClass;
    fn is_resident(&self) -> bool;
    fn entry_count(&self) -> u64;
    fn cached_key_attrs(&self) -> Vec<AttrBag>;

    async fn invalidate_attrs(&self, attrs: &AttrBag) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    async fn load_resident(&self) -> Result<BulkLoadReport>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<K, L, S> CacheAdmin for Dao<K, L, S>
where
    K: CacheKey,
    S: ViewStrategy<K>,
    L: Loader<Key = S::CacheKey>,
    L::Record: EffectiveDated,
    S::CacheKey: KeyAttributes,
{
    fn name(&self) -> &'static str {
        Dao::name(self)
    }

    fn cache_class(&self) -> CacheClass {
        Dao::cache_class(self)
    }

    fn is_resident(&self) -> bool {
        Dao::is_resident(self)
    }

    fn entry_count(&self) -> u64 {
        self.cache().entry_count()
    }

    fn cached_key_attrs(&self) -> Vec<AttrBag> {
        Dao::cached_key_attrs(self)
    }

    async fn invalidate_attrs(&self, attrs: &AttrBag) -> Result<()> {
        Dao::invalidate_attrs(self, attrs).await
    }

    async fn clear(&self) -> Result<()> {
        Dao::clear(self).await
    }

    async fn load_resident(&self) -> Result<BulkLoadReport> {
        Dao::load_resident(self).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Default)]
pub struct DaoRegistry {
    daos: BTreeMap<&'static str, Arc<dyn CacheAdmin>>,
}

impl DaoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a DAO under its cache name. Names must be unique.
    pub fn register<T: CacheAdmin>(&mut self, dao: Arc<T>) -> Result<()> {
        let name = dao.name();
        if self.daos.contains_key(name) {
            return Err(DaoError::Config(format!("DAO '{name}' is registered twice")));
        }
        self.daos.insert(name, dao);
        Ok(())
    }

    /// Chained form of [`register()`](Self::register).
    pub fn with<T: CacheAdmin>(mut self, dao: Arc<T>) -> Result<Self> {
        self.register(dao)?;
        Ok(self)
    }

    /// Make this registry the process-wide one. Only the first call succeeds.
    pub fn install(self) -> Result<&'static DaoRegistry> {
        let mut installed = false;
        let registry = REGISTRY.get_or_init(|| {
            installed = true;
            self
        });
        if !installed {
            return Err(DaoError::RegistryInitialized);
        }
        tracing::info!("DAO registry installed with {} DAO(s)", registry.len());
        Ok(registry)
    }

    pub fn global() -> Option<&'static DaoRegistry> {
        REGISTRY.get()
    }

    /// Typed handle of the DAO registered under `name`.
    pub fn get<T: CacheAdmin>(&self, name: &str) -> Result<Arc<T>> {
        let admin = self.admin(name)?;
        Arc::clone(admin)
            .into_any()
            .downcast::<T>()
            .map_err(|_| DaoError::TypeMismatch { name: name.to_string() })
    }

    pub fn admin(&self, name: &str) -> Result<&Arc<dyn CacheAdmin>> {
        self.daos.get(name).ok_or_else(|| DaoError::Unregistered { name: name.to_string() })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.daos.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.daos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daos.is_empty()
    }

    /// Clear every DAO. All of them are attempted; the first failure is reported.
    pub async fn clear_all(&self) -> Result<()> {
        self.clear_matching(|_| true).await
    }

    pub async fn clear_class(&self, class: CacheClass) -> Result<()> {
        self.clear_matching(|admin| admin.cache_class() == class).await
    }

    async fn clear_matching<F>(&self, matches: F) -> Result<()>
    where
        F: Fn(&dyn CacheAdmin) -> bool,
    {
        let mut outcome = Ok(());
        for admin in self.daos.values() {
            if !matches(&**admin) {
                continue;
            }
            if let Err(err) = admin.clear().await {
                tracing::error!("[{}] clear failed: {err}", admin.name());
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    /// Run the startup bulk load of every resident DAO. Stops at the first failure.
    pub async fn load_resident(&self) -> Result<Vec<(&'static str, BulkLoadReport)>> {
        let mut reports = Vec::new();
        for (name, admin) in self.daos.iter().filter(|(_, a)| a.is_resident()) {
            reports.push((*name, admin.load_resident().await?));
        }
        Ok(reports)
    }
}

impl Debug for DaoRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaoRegistry")
            .field("daos", &self.daos.keys().collect::<Vec<_>>())
            .finish()
    }
}
