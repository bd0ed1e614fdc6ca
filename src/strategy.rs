//! How a DAO turns a business key and query dates into a cache key, and which records of the cached entry it hands
//! out.
//!
//! [`CurrentView`] caches by the business key alone and keeps records valid at the ticket date.
//! [`HistoricalView`] adds a date bucket to the key, so one cached load serves every ticket date within the bucket,
//! and keeps records whose validity window touches the bucket.

use std::fmt::Display;

use crate::bucket::DateRange;
use crate::bucket::Granularity;
use crate::error::DaoError;
use crate::error::Result;
use crate::predicates::IsCurrent;
use crate::predicates::IsCurrentHistorical;
use crate::predicates::IsEffective;
use crate::predicates::IsEffectiveHistorical;
use crate::predicates::Predicate;
use crate::traits::parse_attr;
use crate::traits::EffectiveDated;
use crate::traits::KeyAttributes;
use crate::types::AttrBag;
use crate::types::CacheKey;
use crate::types::Date;
use crate::types::InhibitPolicy;
use crate::types::QueryDates;
use crate::types::Selection;

pub trait ViewStrategy<K: CacheKey>: Send + Sync + 'static {
    type CacheKey: CacheKey;

    fn cache_key(&self, key: &K, dates: QueryDates) -> Self::CacheKey;
    fn predicate(&self, cache_key: &Self::CacheKey, dates: QueryDates) -> ViewPredicate;
}

/// Predicate chosen by a strategy for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPredicate {
    Current(IsCurrent),
    Effective(IsEffective),
    CurrentHistorical(IsCurrentHistorical),
    EffectiveHistorical(IsEffectiveHistorical),
}

impl<R: EffectiveDated + ?Sized> Predicate<R> for ViewPredicate {
    fn test(&self, record: &R) -> bool {
        match self {
            Self::Current(p) => p.test(record),
            Self::Effective(p) => p.test(record),
            Self::CurrentHistorical(p) => p.test(record),
            Self::EffectiveHistorical(p) => p.test(record),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentView {
    selection: Selection,
    inhibit:   InhibitPolicy,
}

impl CurrentView {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            inhibit: InhibitPolicy::default(),
        }
    }

    pub fn with_inhibit(mut self, inhibit: InhibitPolicy) -> Self {
        self.inhibit = inhibit;
        self
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }
}

impl<K: CacheKey> ViewStrategy<K> for CurrentView {
    type CacheKey = K;

    #[inline]
    fn cache_key(&self, key: &K, _dates: QueryDates) -> K {
        key.clone()
    }

    fn predicate(&self, _cache_key: &K, dates: QueryDates) -> ViewPredicate {
        match self.selection {
            Selection::Current => ViewPredicate::Current(IsCurrent::new(dates.ticket).with_inhibit(self.inhibit)),
            Selection::Effective => ViewPredicate::Effective(
                IsEffective::with_dates(dates.ticket, dates.travel).with_inhibit(self.inhibit),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalView {
    granularity: Granularity,
    selection:   Selection,
    inhibit:     InhibitPolicy,
}

impl HistoricalView {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            selection: Selection::default(),
            inhibit: InhibitPolicy::default(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_inhibit(mut self, inhibit: InhibitPolicy) -> Self {
        self.inhibit = inhibit;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }
}

impl<K: CacheKey> ViewStrategy<K> for HistoricalView {
    type CacheKey = HistoricalKey<K>;

    fn cache_key(&self, key: &K, dates: QueryDates) -> HistoricalKey<K> {
        HistoricalKey::new(key.clone(), self.granularity.bucket(dates.ticket))
    }

    fn predicate(&self, cache_key: &HistoricalKey<K>, dates: QueryDates) -> ViewPredicate {
        match self.selection {
            Selection::Current => {
                ViewPredicate::CurrentHistorical(IsCurrentHistorical::new(cache_key.bucket).with_inhibit(self.inhibit))
            }
            Selection::Effective => ViewPredicate::EffectiveHistorical(
                IsEffectiveHistorical::new(cache_key.bucket, dates.travel).with_inhibit(self.inhibit),
            ),
        }
    }
}

/// A business key narrowed down to one date bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoricalKey<K> {
    key:    K,
    bucket: DateRange,
}

impl<K> HistoricalKey<K> {
    pub fn new(key: K, bucket: DateRange) -> Self {
        Self { key, bucket }
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn bucket(&self) -> DateRange {
        self.bucket
    }

    #[inline]
    pub fn start_date(&self) -> Date {
        self.bucket.start()
    }

    #[inline]
    pub fn end_date(&self) -> Date {
        self.bucket.end()
    }
}

impl<K: Display> Display for HistoricalKey<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key, self.bucket)
    }
}

const BUCKET_START: &str = "bucket_start";
const BUCKET_END: &str = "bucket_end";

impl<K: KeyAttributes> KeyAttributes for HistoricalKey<K> {
    fn to_attrs(&self) -> AttrBag {
        let mut attrs = self.key.to_attrs();
        attrs.insert(BUCKET_START.to_string(), self.bucket.start().to_string());
        attrs.insert(BUCKET_END.to_string(), self.bucket.end().to_string());
        attrs
    }

    fn from_attrs(attrs: &AttrBag) -> Result<Self> {
        let start: Date = parse_attr(attrs, BUCKET_START)?;
        let end: Date = parse_attr(attrs, BUCKET_END)?;
        if start >= end {
            return Err(DaoError::malformed_key(BUCKET_END, format!("{end} is not after {start}")));
        }
        Ok(Self::new(K::from_attrs(attrs)?, DateRange::new(start, end)))
    }
}
