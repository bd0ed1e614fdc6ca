//! # fare-dao
//!
//! Effective-dated keyed caches and data access objects for fare and tax pricing data.
//!
//! Think of it as the in-process L1 layer every pricing request reads fare rules, tax rules, carrier and routing
//! tables from, without a database round-trip per request.
//!
//! # The Basics
//!
//! The crate is designed for the following use case:
//!
//! - Key-indexed, record-based reference data; e.g., database tables where a key addresses a handful of rows.
//! - Every row carries a validity window (`create`/`expire`) and often a usage window (`effective`/`discontinue`).
//! - Requests ask "what was valid for this key on this ticket date", sometimes for a date far in the past.
//! - Throughput matters more than freshness; data is reloaded administratively.
//!
//! The cache operates on the following principles:
//!
//! - It is backend-agnostic: a [`Loader`] turns a key into rows.
//! - It is key and record agnostic: records only need to implement [`EffectiveDated`].
//! - Population is single-flight: concurrent misses for one key trigger one load, and every waiter gets the same entry
//!   or the same error.
//! - Implemented as a thin controller over the [moka](https://crates.io/crates/moka) cache.
//! - Fully async.
//!
//! # Components
//!
//! - [`KeyedCache`] maps a key to a shared, immutable [`CacheEntry`] and owns the single-flight logic.
//! - [`Dao`] pairs a cache with a view strategy. [`CurrentDao`] caches by the business key; [`HistoricalDao`] adds a
//!   date bucket computed by [`Granularity`] so one cached load serves every ticket date within the bucket.
//! - [`ScopedBorrow`] is created per request and passed into every `get`. It keeps whole entries the request looked
//!   at alive and owns the filtered copies made for the request.
//! - [`predicates`] hold the effectiveness rules; [`compress`] the optional entry codec; [`bulk`] the startup loader;
//!   [`registry`] the process-wide DAO registry.
//!
//! # Example
//!
//! ```ignore
//! let fare_rules: Arc<CurrentDao<FareKey, FareRuleLoader>> =
//!     Arc::new(CurrentDao::from_settings("fare_rules", FareRuleLoader::new(pool), &settings.settings_for("fare_rules"))?);
//!
//! DaoRegistry::new().with(fare_rules)?.install()?;
//!
//! // Within a request:
//! let mut borrow = ScopedBorrow::new();
//! let dao = DaoRegistry::global().unwrap().get::<CurrentDao<FareKey, FareRuleLoader>>("fare_rules")?;
//! for rule in &dao.get(&key, ticket_date, &mut borrow).await? {
//!     // ...
//! }
//! ```
//!
//! # Errors
//!
//! Loader failures surface as [`DaoError::BackingStore`] naming the operation and the key; nothing gets cached for a
//! failed load and the next `get` retries. An empty answer is a valid, cached answer. Accessors which consider
//! absence an error say so in their name (`get_required`).

pub mod borrow;
pub mod bucket;
pub mod bulk;
pub mod cache;
pub mod compress;
pub mod config;
pub mod dao;
pub mod entry;
pub mod error;
#[cfg(feature = "tracing")]
pub mod logging;
pub mod predicates;
pub mod registry;
pub mod strategy;
pub mod test;
pub mod traits;
pub mod types;

#[doc(inline)]
pub use borrow::ScopedBorrow;
#[doc(inline)]
pub use bucket::DateRange;
#[doc(inline)]
pub use bucket::Granularity;
#[doc(inline)]
pub use cache::KeyedCache;
#[doc(inline)]
pub use dao::CurrentDao;
#[doc(inline)]
pub use dao::Dao;
#[doc(inline)]
pub use dao::HistoricalDao;
#[doc(inline)]
pub use entry::CacheEntry;
#[doc(inline)]
pub use entry::EffectiveView;
#[doc(inline)]
pub use error::DaoError;
#[doc(inline)]
pub use registry::DaoRegistry;
#[doc(inline)]
pub use traits::EffectiveDated;
#[doc(inline)]
pub use traits::Loader;

pub mod prelude {
    pub use crate::borrow::ScopedBorrow;
    pub use crate::bucket::DateRange;
    pub use crate::bucket::Granularity;
    pub use crate::cache::KeyedCache;
    pub use crate::config::CacheSettings;
    pub use crate::config::DaoSettings;
    pub use crate::dao::CurrentDao;
    pub use crate::dao::Dao;
    pub use crate::dao::HistoricalDao;
    pub use crate::entry::EffectiveView;
    pub use crate::error::DaoError;
    pub use crate::predicates::Predicate;
    pub use crate::registry::CacheAdmin;
    pub use crate::registry::DaoRegistry;
    pub use crate::strategy::CurrentView;
    pub use crate::strategy::HistoricalKey;
    pub use crate::strategy::HistoricalView;
    pub use crate::traits::EffectiveDated;
    pub use crate::traits::KeyAttributes;
    pub use crate::traits::Loader;
    pub use crate::types::*;
}

/// Implement [`EffectiveDated`] by naming the record's date fields.
///
/// ```ignore
/// effective_dated!(TaxCode {
///     create: create_date,
///     expire: expire_date,
///     effective: eff_date,
///     discontinue: disc_date,
///     inhibit: inhibited,
/// });
/// ```
///
/// The usage window pair and the inhibit flag are optional.
#[macro_export]
macro_rules! effective_dated {
    ($ty:ty {
        create: $create:ident,
        expire: $expire:ident
        $(, effective: $effective:ident, discontinue: $discontinue:ident)?
        $(, inhibit: $inhibit:ident)?
        $(,)?
    }) => {
        impl $crate::traits::EffectiveDated for $ty {
            fn create_date(&self) -> $crate::types::Date {
                self.$create
            }

            fn expire_date(&self) -> $crate::types::Date {
                self.$expire
            }

            $(
                fn effective_date(&self) -> $crate::types::Date {
                    self.$effective
                }

                fn discontinue_date(&self) -> $crate::types::Date {
                    self.$discontinue
                }
            )?

            $(
                fn is_inhibited(&self) -> bool {
                    self.$inhibit
                }
            )?
        }
    };
}
