/// Scientific-data API client
///
/// Retrieves the pre-processed analytics snapshot
/// (`GET <base>?collection=analytics_data`) from the document store's HTTP
/// front end and normalises it.
///
/// Response: `{ ok, collection, data: { snailObservations, waterChemistry,
/// snailSpecies } }`

use crate::ingest::normalize::{parse_snapshot, NormalizationReport};
use crate::ingest::DatasetProvider;
use crate::logging::{self, Component};
use crate::model::{Dataset, FetchError};
use std::time::Duration;

pub const ANALYTICS_COLLECTION: &str = "analytics_data";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Client construction
// ============================================================================

/// Blocking client with the given request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client, FetchError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))
}

/// Snapshot URL for `base`, adding the collection query unless the caller
/// already pinned one.
pub fn snapshot_url(base: &str) -> String {
    if base.contains("collection=") {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}collection={}", base, separator, ANALYTICS_COLLECTION)
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Fetch and normalise the analytics snapshot.
///
/// # Errors
/// - `HttpError(status)` for any non-2xx response
/// - `Transport` when no response arrived (DNS, TLS, timeout)
/// - `ParseError` / `MissingCollection` when the body is not a snapshot
pub fn fetch_snapshot(
    client: &reqwest::blocking::Client,
    base_url: &str,
) -> Result<(Dataset, NormalizationReport), FetchError> {
    let url = snapshot_url(base_url);

    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpError(status.as_u16()));
    }

    let body = response
        .text()
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    parse_snapshot(&body, false)
}

// ============================================================================
// Provider
// ============================================================================

/// [`DatasetProvider`] backed by the scientific-data API.
pub struct HttpDatasetProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpDatasetProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

impl DatasetProvider for HttpDatasetProvider {
    fn fetch(&self) -> Result<Dataset, FetchError> {
        let (dataset, report) = fetch_snapshot(&self.client, &self.base_url)?;
        logging::info(
            Component::Dataset,
            Some(&self.base_url),
            &format!(
                "fetched {} observations, {} chemistry samples, {} species ({} malformed dropped)",
                dataset.observations.len(),
                dataset.water_chemistry.len(),
                dataset.species.len(),
                report.total_dropped()
            ),
        );
        Ok(dataset)
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}
