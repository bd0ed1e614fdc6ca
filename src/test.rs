#![cfg(any(test, feature = "test"))]
//! Fixtures shared by unit and integration tests: a fare rule record, its key, a scripted loader and a codec that
//! can be told to fail.

pub mod codec;
pub mod record;

pub use codec::FlakyCodec;
pub use key::FareKey;
pub use key::FixtureKey;
pub use loader::FixtureError;
pub use loader::ScriptedLoader;
pub use record::FareRule;

use crate::types::Date;

/// Shorthand for building dates in tests.
pub fn date(year: i32, month: u32, day: u32) -> Date {
    Date::from_ymd_opt(year, month, day).unwrap_or_else(|| panic!("invalid date {year}-{month}-{day}"))
}
