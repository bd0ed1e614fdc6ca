//! Effectiveness predicates.
//!
//! All of them are plain value objects over the record's dates and the query dates; none consults any state beyond
//! its own fields. Boundary dates are inclusive on both ends of a record's windows.

use crate::bucket::DateRange;
use crate::traits::EffectiveDated;
use crate::types::Date;
use crate::types::InhibitPolicy;

pub trait Predicate<R: ?Sized> {
    fn test(&self, record: &R) -> bool;

    fn negate(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

/// Record is valid in the database at `date` and usable on it: `create <= date <= expire` and
/// `effective <= date <= discontinue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsCurrent {
    date:    Date,
    inhibit: InhibitPolicy,
}

impl IsCurrent {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            inhibit: InhibitPolicy::Exclude,
        }
    }

    pub fn with_inhibit(mut self, inhibit: InhibitPolicy) -> Self {
        self.inhibit = inhibit;
        self
    }
}

impl<R: EffectiveDated + ?Sized> Predicate<R> for IsCurrent {
    fn test(&self, record: &R) -> bool {
        self.inhibit.admits(record.is_inhibited())
            && within(record.create_date(), record.expire_date(), self.date)
            && within(record.effective_date(), record.discontinue_date(), self.date)
    }
}

/// Record is valid in the database at the ticket date and its usage window contains the travel date. With both
/// dates equal this is the same as [`IsCurrent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsEffective {
    ticket:  Date,
    travel:  Date,
    inhibit: InhibitPolicy,
}

impl IsEffective {
    pub fn new(date: Date) -> Self {
        Self::with_dates(date, date)
    }

    pub fn with_dates(ticket: Date, travel: Date) -> Self {
        Self {
            ticket,
            travel,
            inhibit: InhibitPolicy::Exclude,
        }
    }

    pub fn with_inhibit(mut self, inhibit: InhibitPolicy) -> Self {
        self.inhibit = inhibit;
        self
    }
}

impl<R: EffectiveDated + ?Sized> Predicate<R> for IsEffective {
    fn test(&self, record: &R) -> bool {
        self.inhibit.admits(record.is_inhibited())
            && within(record.create_date(), record.expire_date(), self.ticket)
            && within(record.effective_date(), record.discontinue_date(), self.travel)
    }
}

/// Historical form of [`IsCurrent`]: the record's validity window intersects the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsCurrentHistorical {
    bucket:  DateRange,
    inhibit: InhibitPolicy,
}

impl IsCurrentHistorical {
    pub fn new(bucket: DateRange) -> Self {
        Self {
            bucket,
            inhibit: InhibitPolicy::Exclude,
        }
    }

    pub fn with_inhibit(mut self, inhibit: InhibitPolicy) -> Self {
        self.inhibit = inhibit;
        self
    }
}

impl<R: EffectiveDated + ?Sized> Predicate<R> for IsCurrentHistorical {
    fn test(&self, record: &R) -> bool {
        self.inhibit.admits(record.is_inhibited()) && self.bucket.overlaps(record.create_date(), record.expire_date())
    }
}

/// Historical form of [`IsEffective`]: the validity window intersects the bucket and the usage window contains the
/// travel date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsEffectiveHistorical {
    bucket:  DateRange,
    travel:  Date,
    inhibit: InhibitPolicy,
}

impl IsEffectiveHistorical {
    pub fn new(bucket: DateRange, travel: Date) -> Self {
        Self {
            bucket,
            travel,
            inhibit: InhibitPolicy::Exclude,
        }
    }

    pub fn with_inhibit(mut self, inhibit: InhibitPolicy) -> Self {
        self.inhibit = inhibit;
        self
    }
}

impl<R: EffectiveDated + ?Sized> Predicate<R> for IsEffectiveHistorical {
    fn test(&self, record: &R) -> bool {
        IsCurrentHistorical::new(self.bucket)
            .with_inhibit(self.inhibit)
            .test(record)
            && within(record.effective_date(), record.discontinue_date(), self.travel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Not<P>(pub P);

impl<R: ?Sized, P: Predicate<R>> Predicate<R> for Not<P> {
    fn test(&self, record: &R) -> bool {
        !self.0.test(record)
    }
}

pub type IsNotCurrent = Not<IsCurrent>;
pub type IsNotEffective = Not<IsEffective>;

#[inline]
fn within(from: Date, to: Date, date: Date) -> bool {
    from <= date && date <= to
}

#[inline]
pub fn is_current<R: EffectiveDated + ?Sized>(record: &R, date: Date) -> bool {
    IsCurrent::new(date).test(record)
}

#[inline]
pub fn is_effective<R: EffectiveDated + ?Sized>(record: &R, ticket: Date, travel: Date) -> bool {
    IsEffective::with_dates(ticket, travel).test(record)
}

/// Outcome of running a predicate over a shared slice.
#[derive(Debug)]
pub enum Selected<R> {
    /// Every record passed, the slice can be handed out as is.
    All,
    /// Only these did.
    Subset(Vec<R>),
}

/// Partition `records` by `predicate` without touching the originals. Nothing is copied when all records pass.
pub fn select<R, P>(records: &[R], predicate: &P) -> Selected<R>
where
    R: Clone,
    P: Predicate<R> + ?Sized,
{
    match records.iter().position(|r| !predicate.test(r)) {
        None => Selected::All,
        Some(first_rejected) => {
            let mut subset = Vec::with_capacity(first_rejected);
            subset.extend_from_slice(&records[..first_rejected]);
            subset.extend(records[first_rejected + 1..].iter().filter(|r| predicate.test(r)).cloned());
            Selected::Subset(subset)
        }
    }
}
