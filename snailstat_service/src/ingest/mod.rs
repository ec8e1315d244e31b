/// Dataset ingestion.
///
/// A [`DatasetProvider`] produces one complete [`Dataset`] snapshot per
/// call. [`CachedDataset`] sits in front of a provider and re-fetches only
/// when its snapshot is older than the dataset max-age.
///
/// Submodules:
/// - `normalize`: document snapshot to canonical records.
/// - `http`: scientific-data API client.
/// - `file`: snapshot exported to disk.
/// - `synthetic`: seeded generator for offline development.

pub mod file;
pub mod http;
pub mod normalize;
pub mod synthetic;

use crate::cache::{Clock, ResultCache, DEFAULT_DATASET_MAX_AGE_SECS};
use crate::logging::{self, Component};
use crate::model::{Dataset, FetchError};
use chrono::Duration;
use std::sync::Arc;

/// Anything that can produce a full analytics snapshot.
pub trait DatasetProvider: Send + Sync {
    fn fetch(&self) -> Result<Dataset, FetchError>;

    /// Short label for logs and CLI output.
    fn describe(&self) -> String;
}

impl<P: DatasetProvider + ?Sized> DatasetProvider for Box<P> {
    fn fetch(&self) -> Result<Dataset, FetchError> {
        (**self).fetch()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

const SNAPSHOT_KEY: &str = "dataset";

/// Dataset-level cache in front of a provider.
pub struct CachedDataset<P> {
    provider: P,
    cache: ResultCache<Arc<Dataset>>,
    max_age: Duration,
}

impl<P: DatasetProvider> CachedDataset<P> {
    pub fn new(provider: P, clock: Arc<dyn Clock>) -> Self {
        Self::with_max_age(provider, clock, Duration::seconds(DEFAULT_DATASET_MAX_AGE_SECS))
    }

    pub fn with_max_age(provider: P, clock: Arc<dyn Clock>, max_age: Duration) -> Self {
        Self {
            provider,
            cache: ResultCache::new(clock),
            max_age,
        }
    }

    /// The current snapshot, re-fetched if stale. Failures are logged and
    /// returned; nothing is cached for them.
    pub fn snapshot(&self) -> Result<Arc<Dataset>, FetchError> {
        self.cache.try_get_or_compute(SNAPSHOT_KEY, self.max_age, || {
            let label = self.provider.describe();
            logging::info(Component::Dataset, Some(&label), "refreshing dataset snapshot");
            self.provider
                .fetch()
                .map(Arc::new)
                .inspect_err(|err| logging::log_fetch_failure(&label, "snapshot", err))
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}
