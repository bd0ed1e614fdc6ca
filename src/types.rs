use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;

/// Calendar date used for every effectivity comparison.
pub type Date = NaiveDate;

/// Generic field-name to value representation of a key, used by administrative tooling.
pub type AttrBag = BTreeMap<String, String>;

/// Bounds every cache key has to satisfy.
pub trait CacheKey: Debug + Display + Hash + Clone + Eq + Sized + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Debug + Display + Hash + Clone + Eq + Sized + Send + Sync + 'static {}

/// Named grouping of caches. Selects the backing-store pool and the sizing policy only.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum CacheClass {
    #[default]
    Common,
    Rules,
    Fares,
    Taxes,
    Routing,
    Historical,
}

/// How inhibited records are treated by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InhibitPolicy {
    #[default]
    Exclude,
    Include,
}

impl InhibitPolicy {
    #[inline]
    pub fn admits(self, inhibited: bool) -> bool {
        match self {
            Self::Exclude => !inhibited,
            Self::Include => true,
        }
    }
}

/// Which family of effectiveness predicates a view applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Database validity window only: create/expire.
    #[default]
    Current,
    /// Database validity window plus the effective/discontinue usage window.
    Effective,
}

/// The pair of dates a query is evaluated against. For most calls both are the ticketing date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryDates {
    pub ticket: Date,
    pub travel: Date,
}

impl QueryDates {
    pub fn on(date: Date) -> Self {
        Self {
            ticket: date,
            travel: date,
        }
    }

    pub fn new(ticket: Date, travel: Date) -> Self {
        Self { ticket, travel }
    }
}

/// Caller-side policy for historical queries made as of a rule application date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Retry with the ticket date when the application date yields nothing.
    #[default]
    OnEmpty,
    Never,
}
