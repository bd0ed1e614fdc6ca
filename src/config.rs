//! Externally supplied cache configuration.
//!
//! ```json
//! {
//!     "default": { "max_capacity": 50000 },
//!     "daos": {
//!         "fare_rules": { "cache_class": "Rules", "compress": true },
//!         "tax_codes_hist": { "cache_class": "Historical", "granularity": { "months": 3 } }
//!     }
//! }
//! ```
//!
//! Per-DAO sections only name what differs from `default`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::bucket::Granularity;
use crate::cache::KeyedCache;
use crate::compress::RecordCompressor;
use crate::error::DaoError;
use crate::error::Result;
use crate::traits::Loader;
use crate::types::CacheClass;
use crate::types::Selection;

const MAX_COMPRESS_LEVEL: i32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaoSettings {
    pub cache_class:          CacheClass,
    pub max_capacity:         u64,
    /// Bulk load at startup and right after every clear.
    pub resident:             bool,
    pub compress:             bool,
    /// Entries with fewer records are kept plain even when `compress` is on.
    pub compress_min_records: usize,
    pub compress_level:       i32,
    /// Historical DAOs only.
    pub granularity:          Granularity,
    pub selection:            Selection,
}

impl Default for DaoSettings {
    fn default() -> Self {
        Self {
            cache_class:          CacheClass::Common,
            max_capacity:         10_000,
            resident:             false,
            compress:             false,
            compress_min_records: 32,
            compress_level:       4,
            granularity:          Granularity::MONTH,
            selection:            Selection::Current,
        }
    }
}

impl DaoSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(DaoError::Config("max_capacity must be positive".to_string()));
        }
        if !(0..=MAX_COMPRESS_LEVEL).contains(&self.compress_level) {
            return Err(DaoError::Config(format!(
                "compress_level {} is outside of 0..={MAX_COMPRESS_LEVEL}",
                self.compress_level
            )));
        }
        Ok(())
    }

    /// Build a [`KeyedCache`] named `name` according to these settings.
    pub fn build_cache<L>(&self, name: &'static str, loader: L) -> Result<KeyedCache<L>>
    where
        L: Loader,
        L::Record: Serialize + DeserializeOwned,
    {
        self.validate()?;

        let mut builder = KeyedCache::builder()
            .loader(loader)
            .name(name)
            .cache_class(self.cache_class)
            .max_capacity(self.max_capacity);

        if self.compress {
            builder = builder.compressed_with(
                RecordCompressor::new()
                    .with_level(self.compress_level)
                    .with_min_records(self.compress_min_records),
            );
        }

        builder.build().map_err(|err| DaoError::Config(format!("cache '{name}': {err}")))
    }
}

/// Per-DAO deviations from [`CacheSettings::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaoOverrides {
    pub cache_class:          Option<CacheClass>,
    pub max_capacity:         Option<u64>,
    pub resident:             Option<bool>,
    pub compress:             Option<bool>,
    pub compress_min_records: Option<usize>,
    pub compress_level:       Option<i32>,
    pub granularity:          Option<Granularity>,
    pub selection:            Option<Selection>,
}

impl DaoOverrides {
    fn apply(&self, base: &DaoSettings) -> DaoSettings {
        DaoSettings {
            cache_class:          self.cache_class.unwrap_or(base.cache_class),
            max_capacity:         self.max_capacity.unwrap_or(base.max_capacity),
            resident:             self.resident.unwrap_or(base.resident),
            compress:             self.compress.unwrap_or(base.compress),
            compress_min_records: self.compress_min_records.unwrap_or(base.compress_min_records),
            compress_level:       self.compress_level.unwrap_or(base.compress_level),
            granularity:          self.granularity.unwrap_or(base.granularity),
            selection:            self.selection.unwrap_or(base.selection),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub default: DaoSettings,
    pub daos:    HashMap<String, DaoOverrides>,
}

impl CacheSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|err| DaoError::Config(format!("cannot parse cache settings: {err}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| DaoError::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Effective settings of the DAO named `name`.
    pub fn settings_for(&self, name: &str) -> DaoSettings {
        match self.daos.get(name) {
            Some(overrides) => overrides.apply(&self.default),
            None => self.default.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for name in self.daos.keys() {
            self.settings_for(name)
                .validate()
                .map_err(|err| DaoError::Config(format!("DAO '{name}': {err}")))?;
        }
        Ok(())
    }
}
