//! Service configuration
//!
//! Loaded from a TOML file, then overridden by environment variables (a
//! `.env` file in the working directory is honoured). Every section and key
//! is optional:
//!
//! ```toml
//! [dataset]
//! url = "https://example.org/api/scientific-data"   # or `path`, or `synthetic_seed`
//! timeout_secs = 30
//! max_age_secs = 300
//!
//! [cache]
//! result_max_age_secs = 3600
//!
//! [interpolation]
//! default_grid_size = 100
//!
//! [logging]
//! level = "info"
//! file = "/var/log/snailstat.log"
//! ```

use crate::analysis::interpolation::DEFAULT_GRID_SIZE;
use crate::cache::{DEFAULT_DATASET_MAX_AGE_SECS, DEFAULT_RESULT_MAX_AGE_SECS};
use crate::ingest::file::FileDatasetProvider;
use crate::ingest::http::{HttpDatasetProvider, DEFAULT_TIMEOUT_SECS};
use crate::ingest::synthetic::SyntheticDatasetProvider;
use crate::ingest::DatasetProvider;
use crate::logging::LogLevel;
use crate::model::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATASET_URL: &str = "SNAILSTAT_DATASET_URL";
pub const ENV_DATASET_PATH: &str = "SNAILSTAT_DATASET_PATH";
pub const ENV_LOG_LEVEL: &str = "SNAILSTAT_LOG_LEVEL";

/// Largest accepted max-age; `chrono::Duration` holds at most `i64::MAX` ms.
pub const MAX_AGE_LIMIT_SECS: u64 = (i64::MAX / 1000) as u64;

/// Largest accepted request timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub dataset: DatasetConfig,
    pub cache: CacheConfig,
    pub interpolation: InterpolationConfig,
    pub logging: LoggingConfig,
}

/// Where the snapshot comes from and how long it stays fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
    pub synthetic_seed: Option<u64>,
    pub timeout_secs: u64,
    pub max_age_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            synthetic_seed: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_age_secs: DEFAULT_DATASET_MAX_AGE_SECS as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub result_max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            result_max_age_secs: DEFAULT_RESULT_MAX_AGE_SECS as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Grid edge used when a request names none.
    pub default_grid_size: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            default_grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// The one dataset backend a valid configuration names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetBackend {
    Http { url: String, timeout: Duration },
    File(PathBuf),
    Synthetic(u64),
}

impl DatasetBackend {
    pub fn into_provider(self) -> Result<Box<dyn DatasetProvider>> {
        let provider: Box<dyn DatasetProvider> = match self {
            DatasetBackend::Http { url, timeout } => Box::new(HttpDatasetProvider::new(url, timeout)?),
            DatasetBackend::File(path) => Box::new(FileDatasetProvider::new(path)),
            DatasetBackend::Synthetic(seed) => Box::new(SyntheticDatasetProvider::new(seed)),
        };
        Ok(provider)
    }
}

impl ServiceConfig {
    /// Reads `path` (if given), applies `.env` and process environment
    /// overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |_| {})
    }

    /// Like [`load`](Self::load), with `adjust` applied after the
    /// environment and before validation (command-line flags).
    pub fn load_with(path: Option<&Path>, adjust: impl FnOnce(&mut Self)) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        adjust(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AnalyticsError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| AnalyticsError::Config(format!("invalid config: {}", e)))
    }

    /// Applies environment overrides read through `lookup`. A backend named
    /// in the environment replaces whichever backend the file named.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let url = lookup(ENV_DATASET_URL).filter(|v| !v.trim().is_empty());
        let path = lookup(ENV_DATASET_PATH).filter(|v| !v.trim().is_empty());
        if url.is_some() || path.is_some() {
            self.dataset.url = url;
            self.dataset.path = path.map(PathBuf::from);
            self.dataset.synthetic_seed = None;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.backend()?;
        self.log_level()?;

        let d = &self.dataset;
        if d.timeout_secs == 0 {
            return Err(AnalyticsError::Config("dataset.timeout_secs must be positive".into()));
        }
        if d.max_age_secs == 0 {
            return Err(AnalyticsError::Config("dataset.max_age_secs must be positive".into()));
        }
        if self.cache.result_max_age_secs == 0 {
            return Err(AnalyticsError::Config("cache.result_max_age_secs must be positive".into()));
        }
        if d.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(AnalyticsError::Config(format!(
                "dataset.timeout_secs must be at most {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.cache.result_max_age_secs > MAX_AGE_LIMIT_SECS {
            return Err(AnalyticsError::Config(format!(
                "cache.result_max_age_secs must be at most {}",
                MAX_AGE_LIMIT_SECS
            )));
        }
        if d.max_age_secs > self.cache.result_max_age_secs {
            return Err(AnalyticsError::Config(format!(
                "dataset.max_age_secs ({}) exceeds cache.result_max_age_secs ({})",
                d.max_age_secs, self.cache.result_max_age_secs
            )));
        }
        if self.interpolation.default_grid_size == 0 {
            return Err(AnalyticsError::Config("interpolation.default_grid_size must be positive".into()));
        }
        Ok(())
    }

    /// The configured backend; exactly one of url, path and synthetic_seed
    /// must be set.
    pub fn backend(&self) -> Result<DatasetBackend> {
        let d = &self.dataset;
        match (&d.url, &d.path, d.synthetic_seed) {
            (Some(url), None, None) => Ok(DatasetBackend::Http {
                url: url.clone(),
                timeout: Duration::from_secs(d.timeout_secs),
            }),
            (None, Some(path), None) => Ok(DatasetBackend::File(path.clone())),
            (None, None, Some(seed)) => Ok(DatasetBackend::Synthetic(seed)),
            (None, None, None) => Err(AnalyticsError::Config(format!(
                "no dataset backend: set dataset.url, dataset.path or dataset.synthetic_seed (or {})",
                ENV_DATASET_URL
            ))),
            _ => Err(AnalyticsError::Config(
                "only one of dataset.url, dataset.path and dataset.synthetic_seed may be set".into(),
            )),
        }
    }

    pub fn log_level(&self) -> Result<LogLevel> {
        self.logging.level.parse()
    }

    pub fn dataset_max_age(&self) -> chrono::Duration {
        max_age(self.dataset.max_age_secs)
    }

    pub fn result_max_age(&self) -> chrono::Duration {
        max_age(self.cache.result_max_age_secs)
    }
}

/// Saturates at the largest representable duration instead of panicking.
fn max_age(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_full_file_parses() {
        let config = ServiceConfig::from_toml(
            r#"
            [dataset]
            url = "https://example.org/api/scientific-data"
            timeout_secs = 10
            max_age_secs = 120

            [cache]
            result_max_age_secs = 1800

            [interpolation]
            default_grid_size = 60

            [logging]
            level = "debug"
            file = "snailstat.log"
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.dataset.timeout_secs, 10);
        assert_eq!(config.result_max_age(), chrono::Duration::minutes(30));
        assert_eq!(config.interpolation.default_grid_size, 60);
        assert_eq!(config.log_level().unwrap(), LogLevel::Debug);
        assert_eq!(
            config.backend().unwrap(),
            DatasetBackend::Http {
                url: "https://example.org/api/scientific-data".into(),
                timeout: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config = ServiceConfig::from_toml("[dataset]\nsynthetic_seed = 7\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.dataset.timeout_secs, 30);
        assert_eq!(config.dataset_max_age(), chrono::Duration::minutes(5));
        assert_eq!(config.result_max_age(), chrono::Duration::hours(1));
        assert_eq!(config.interpolation.default_grid_size, 100);
        assert_eq!(config.backend().unwrap(), DatasetBackend::Synthetic(7));
    }

    #[test]
    fn test_no_backend_is_rejected() {
        let err = ServiceConfig::default().validate().unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_two_backends_are_rejected() {
        let config = ServiceConfig::from_toml("[dataset]\nurl = \"http://x\"\nsynthetic_seed = 1\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_values_are_rejected() {
        for toml in [
            "[dataset]\nsynthetic_seed = 1\ntimeout_secs = 0\n",
            "[dataset]\nsynthetic_seed = 1\nmax_age_secs = 0\n",
            "[dataset]\nsynthetic_seed = 1\n[cache]\nresult_max_age_secs = 0\n",
            "[dataset]\nsynthetic_seed = 1\n[interpolation]\ndefault_grid_size = 0\n",
        ] {
            let config = ServiceConfig::from_toml(toml).unwrap();
            assert!(config.validate().is_err(), "should reject:\n{}", toml);
        }
    }

    #[test]
    fn test_dataset_window_must_not_exceed_result_window() {
        let config = ServiceConfig::from_toml(
            "[dataset]\nsynthetic_seed = 1\nmax_age_secs = 7200\n[cache]\nresult_max_age_secs = 3600\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_backend_replaces_file_backend() {
        let mut config = ServiceConfig::from_toml("[dataset]\nsynthetic_seed = 3\n").unwrap();
        config.apply_overrides(env(&[(ENV_DATASET_PATH, "/tmp/snapshot.json"), (ENV_LOG_LEVEL, "warn")]));
        config.validate().unwrap();
        assert_eq!(config.backend().unwrap(), DatasetBackend::File(PathBuf::from("/tmp/snapshot.json")));
        assert_eq!(config.log_level().unwrap(), LogLevel::Warning);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = ServiceConfig::from_toml("[dataset]\nsynthetic_seed = 3\n").unwrap();
        config.apply_overrides(env(&[(ENV_DATASET_URL, "  ")]));
        assert_eq!(config.backend().unwrap(), DatasetBackend::Synthetic(3));
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let config = ServiceConfig::from_toml("[dataset]\nsynthetic_seed = 1\n[logging]\nlevel = \"chatty\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ServiceConfig::from_toml("[dataset\nurl=").unwrap_err();
        assert!(matches!(err, AnalyticsError::Config(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snailstat.toml");
        std::fs::write(&path, "[dataset]\nsynthetic_seed = 11\n").unwrap();
        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.dataset.synthetic_seed, Some(11));
    }

    #[test]
    fn test_out_of_range_windows_are_rejected() {
        for toml in [
            "[dataset]\nsynthetic_seed = 1\n[cache]\nresult_max_age_secs = 10000000000000000\n",
            "[dataset]\nsynthetic_seed = 1\nmax_age_secs = 10000000000000000\n[cache]\nresult_max_age_secs = 10000000000000000\n",
            "[dataset]\nsynthetic_seed = 1\ntimeout_secs = 100000\n",
        ] {
            let config = ServiceConfig::from_toml(toml).unwrap();
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), "config", "should reject:\n{}", toml);
        }
    }

    #[test]
    fn test_largest_accepted_window_does_not_panic() {
        let mut config = ServiceConfig::from_toml("[dataset]\nsynthetic_seed = 1\n").unwrap();
        config.cache.result_max_age_secs = MAX_AGE_LIMIT_SECS;
        config.dataset.max_age_secs = MAX_AGE_LIMIT_SECS;
        config.validate().unwrap();
        assert!(config.result_max_age() > chrono::Duration::days(365 * 1000));
        assert_eq!(config.dataset_max_age(), config.result_max_age());

        // Accessors saturate even when validation was skipped.
        config.cache.result_max_age_secs = u64::MAX;
        assert_eq!(config.result_max_age(), chrono::Duration::MAX);
    }

    #[test]
    fn test_load_with_applies_adjustment_before_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snailstat.toml");
        std::fs::write(&path, "[dataset]\nsynthetic_seed = 11\n[interpolation]\ndefault_grid_size = 40\n").unwrap();

        let config = ServiceConfig::load_with(Some(&path), |c| {
            c.dataset.url = None;
            c.dataset.path = None;
            c.dataset.synthetic_seed = Some(12);
        })
        .unwrap();
        assert_eq!(config.backend().unwrap(), DatasetBackend::Synthetic(12));
        assert_eq!(config.interpolation.default_grid_size, 40);

        let err = ServiceConfig::load_with(Some(&path), |c| c.dataset.max_age_secs = 0).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
