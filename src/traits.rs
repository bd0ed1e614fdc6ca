use async_trait::async_trait;
use std::fmt::Debug;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::DaoError;
use crate::error::Result;
use crate::types::AttrBag;
use crate::types::CacheKey;
use crate::types::Date;

// For types that are in charge of reading records from the backing store.
#[async_trait]
pub trait Loader: Sized + Send + Sync + 'static {
    /// The key type to be used with [`KeyedCache::get()`](crate::KeyedCache::get). Historical DAOs use
    /// [`HistoricalKey`](crate::strategy::HistoricalKey) here.
    type Key: CacheKey;
    type Record: Debug + Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch every row for the key. An empty vector is a valid answer and gets cached.
    async fn load(&self, key: &Self::Key) -> Result<Vec<Self::Record>, Self::Error>;

    /// Fetch the whole source in one pass. `None` means the loader doesn't support bulk loading.
    async fn load_all(&self) -> Result<Option<Vec<Self::Record>>, Self::Error> {
        Ok(None)
    }

    /// Derive the cache key a freshly loaded record belongs to. Required for bulk loading only.
    fn create_key(&self, _record: &Self::Record) -> Option<Self::Key> {
        None
    }
}

/// The only part of a domain record the cache core looks at.
///
/// Records lacking a separate usage window get it defaulted to the validity window.
pub trait EffectiveDated {
    fn create_date(&self) -> Date;
    fn expire_date(&self) -> Date;

    fn effective_date(&self) -> Date {
        self.create_date()
    }

    fn discontinue_date(&self) -> Date {
        self.expire_date()
    }

    fn is_inhibited(&self) -> bool {
        false
    }
}

/// Translation between a typed key and a field-name keyed attribute bag.
pub trait KeyAttributes: Sized {
    fn to_attrs(&self) -> AttrBag;
    fn from_attrs(attrs: &AttrBag) -> Result<Self>;
}

/// Fetch a mandatory field out of an attribute bag.
pub fn required_attr<'a>(attrs: &'a AttrBag, field: &str) -> Result<&'a str> {
    let value = attrs
        .get(field)
        .map(|v| v.trim())
        .ok_or_else(|| DaoError::malformed_key(field, "is missing"))?;
    if value.is_empty() {
        return Err(DaoError::malformed_key(field, "is empty"));
    }
    Ok(value)
}

/// Fetch a mandatory field and parse it.
pub fn parse_attr<T>(attrs: &AttrBag, field: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    required_attr(attrs, field)?
        .parse::<T>()
        .map_err(|err| DaoError::malformed_key(field, format!("cannot be parsed: {err}")))
}
