//! Startup population of a whole cache in one pass.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tracing::instrument;

use crate::cache::KeyedCache;
use crate::error::DaoError;
use crate::error::Result;
use crate::traits::Loader;

/// Outcome of a [`StartupLoader`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkLoadReport {
    /// Rows returned by the loader.
    pub rows:    usize,
    /// Entries published.
    pub keys:    usize,
    /// Rows no key could be derived for.
    pub skipped: usize,
    pub elapsed: Duration,
}

impl Display for BulkLoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} row(s) into {} key(s), {} skipped, in {:?}",
            self.rows, self.keys, self.skipped, self.elapsed
        )
    }
}

/// Loads every row of a source through [`Loader::load_all()`], groups the rows by [`Loader::create_key()`] and
/// publishes one entry per group, bypassing the on-demand path.
///
/// Nothing is published unless every group could be turned into an entry.
pub struct StartupLoader<'a, L: Loader> {
    cache: &'a KeyedCache<L>,
}

impl<'a, L: Loader> StartupLoader<'a, L> {
    pub fn new(cache: &'a KeyedCache<L>) -> Self {
        Self { cache }
    }

    #[instrument(level = "debug", skip(self), fields(cache = self.cache.name()))]
    pub async fn run(&self) -> Result<BulkLoadReport> {
        let started = Instant::now();
        let name = self.cache.name();

        let rows = match self.cache.loader().load_all().await {
            Ok(Some(rows)) => rows,
            Ok(None) => {
                return Err(DaoError::Config(format!("loader of '{name}' does not support bulk loading")));
            }
            Err(err) => {
                tracing::error!("[{name}] LOAD_ALL failed: {err}");
                return Err(DaoError::backing_store("load_all", name, Arc::new(err)));
            }
        };

        let mut report = BulkLoadReport {
            rows: rows.len(),
            ..Default::default()
        };

        // Keys in first-seen order, records in loader order within a key.
        let mut order = Vec::new();
        let mut groups: HashMap<L::Key, Vec<L::Record>> = HashMap::new();
        for record in rows {
            let Some(key) = self.cache.loader().create_key(&record)
            else {
                tracing::warn!("[{name}] LOAD_ALL: no key for {record:?}, row skipped");
                report.skipped += 1;
                continue;
            };
            groups
                .entry(key)
                .or_insert_with_key(|key| {
                    order.push(key.clone());
                    Vec::new()
                })
                .push(record);
        }

        let mut entries = Vec::with_capacity(order.len());
        for key in order {
            let records = groups.remove(&key).unwrap_or_default();
            let entry = self.cache.make_entry(records).map_err(|err| {
                tracing::error!("[{name}] LOAD_ALL could not store {key}: {err}");
                err
            })?;
            entries.push((key, Arc::new(entry)));
        }

        report.keys = entries.len();
        for (key, entry) in entries {
            self.cache.publish(key, entry).await;
        }

        report.elapsed = started.elapsed();
        tracing::info!("[{name}] bulk loaded {report}");
        Ok(report)
    }
}
