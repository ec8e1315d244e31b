//! Dataset Verification Module
//!
//! Checks a snapshot endpoint before pointing the service at it, and audits
//! a loaded dataset to show how many observations each analytics operation
//! will actually be able to use.

use crate::analysis::regression::first_sample_ph;
use crate::ingest::http::{build_client, fetch_snapshot, snapshot_url};
use crate::ingest::normalize::NormalizationReport;
use crate::model::{Dataset, FetchError, Observation, ReviewStatus, Source, StationId};
use crate::stations::{band_station, station_for};
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

// ============================================================================
// Endpoint verification
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Snapshot parsed cleanly with observations and chemistry.
    Success,
    /// Usable, but records were dropped or a collection is empty.
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EndpointVerification {
    pub url: String,
    pub timestamp: String,
    pub status: VerificationStatus,
    /// The server answered, even if with an error status.
    pub reachable: bool,
    pub observations: usize,
    pub water_chemistry: usize,
    pub species: usize,
    pub malformed: usize,
    pub error_message: Option<String>,
}

/// Fetches the snapshot at `base_url` and grades it.
pub fn verify_dataset_endpoint(client: &reqwest::blocking::Client, base_url: &str) -> EndpointVerification {
    assess_snapshot(&snapshot_url(base_url), fetch_snapshot(client, base_url))
}

/// Builds a client with `timeout` and verifies `base_url`.
pub fn run_endpoint_verification(base_url: &str, timeout: Duration) -> EndpointVerification {
    match build_client(timeout) {
        Ok(client) => verify_dataset_endpoint(&client, base_url),
        Err(err) => assess_snapshot(&snapshot_url(base_url), Err(err)),
    }
}

/// Grades a fetch outcome.
pub fn assess_snapshot(
    url: &str,
    outcome: Result<(Dataset, NormalizationReport), FetchError>,
) -> EndpointVerification {
    let mut result = EndpointVerification {
        url: url.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        status: VerificationStatus::Failed,
        reachable: false,
        observations: 0,
        water_chemistry: 0,
        species: 0,
        malformed: 0,
        error_message: None,
    };

    let (dataset, report) = match outcome {
        Ok(fetched) => fetched,
        Err(err) => {
            // Anything past the transport layer means the server answered.
            result.reachable = !matches!(err, FetchError::Transport(_) | FetchError::Io(_));
            result.error_message = Some(err.to_string());
            return result;
        }
    };

    result.reachable = true;
    result.observations = dataset.observations.len();
    result.water_chemistry = dataset.water_chemistry.len();
    result.species = dataset.species.len();
    result.malformed = report.total_dropped();

    result.status = if result.observations == 0 {
        result.error_message = Some("snapshot holds no usable observations".into());
        VerificationStatus::Failed
    } else if result.malformed > 0 || result.water_chemistry == 0 || result.species == 0 {
        VerificationStatus::PartialSuccess
    } else {
        VerificationStatus::Success
    };
    result
}

// ============================================================================
// Dataset audit
// ============================================================================

/// Observations from one source and how many each operation can use.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SourceAudit {
    pub source: String,
    pub observations: usize,
    pub t_test_depth: usize,
    pub anova_site: usize,
    pub anova_habitat: usize,
    pub regression_ph: usize,
    pub chi_species_by_site: usize,
    pub kriging_density: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DatasetAudit {
    pub timestamp: String,
    pub total_observations: usize,
    pub sources: Vec<SourceAudit>,
    pub missing_coordinates: usize,
    /// Located observations outside every station band; they join the
    /// default station's chemistry.
    pub outside_station_bands: usize,
    pub stations_with_chemistry: Vec<StationId>,
    pub stations_without_chemistry: Vec<StationId>,
    pub species_catalog: usize,
}

pub fn audit_dataset(dataset: &Dataset) -> DatasetAudit {
    let station_ph = first_sample_ph(&dataset.water_chemistry);
    let has_ph = |obs: &Observation| {
        obs.coordinates
            .as_ref()
            .and_then(|c| station_ph.get(&station_for(c)).copied().flatten())
            .is_some()
    };

    let sources = Source::ALL
        .iter()
        .map(|&source| {
            let mut audit = SourceAudit {
                source: source.to_string(),
                ..SourceAudit::default()
            };
            for obs in dataset.from_source(source) {
                let density = obs.density_per_m2.is_some();
                audit.observations += 1;
                if density
                    && obs.depth_m.is_some()
                    && matches!(obs.status, ReviewStatus::Approved | ReviewStatus::Denied)
                {
                    audit.t_test_depth += 1;
                }
                audit.anova_site += usize::from(density && obs.site.is_some());
                audit.anova_habitat += usize::from(density && obs.habitat.is_some());
                audit.regression_ph += usize::from(density && has_ph(obs));
                audit.chi_species_by_site += usize::from(obs.species_status.is_some() && obs.site.is_some());
                audit.kriging_density += usize::from(density && obs.coordinates.is_some());
            }
            audit
        })
        .collect();

    let missing_coordinates = dataset.observations.iter().filter(|o| o.coordinates.is_none()).count();
    let outside_station_bands = dataset
        .observations
        .iter()
        .filter_map(|o| o.coordinates)
        .filter(|c| band_station(c.lng, c.lat).is_none())
        .count();

    let (stations_with_chemistry, stations_without_chemistry): (Vec<StationId>, Vec<StationId>) =
        StationId::ALL
            .into_iter()
            .partition(|station| dataset.water_chemistry.iter().any(|s| s.station == *station));

    DatasetAudit {
        timestamp: Utc::now().to_rfc3339(),
        total_observations: dataset.observations.len(),
        sources,
        missing_coordinates,
        outside_station_bands,
        stations_with_chemistry,
        stations_without_chemistry,
        species_catalog: dataset.species.len(),
    }
}

// ============================================================================
// Console output
// ============================================================================

pub fn print_verification(result: &EndpointVerification) {
    println!("Endpoint: {}", result.url);
    match result.status {
        VerificationStatus::Success => println!(
            "  OK: {} observations, {} chemistry samples, {} species",
            result.observations, result.water_chemistry, result.species
        ),
        VerificationStatus::PartialSuccess => println!(
            "  PARTIAL: {} observations, {} chemistry samples, {} species, {} malformed dropped",
            result.observations, result.water_chemistry, result.species, result.malformed
        ),
        VerificationStatus::Failed => println!(
            "  FAILED (reachable: {}): {}",
            result.reachable,
            result.error_message.as_deref().unwrap_or("unknown")
        ),
    }
}

pub fn print_audit(audit: &DatasetAudit) {
    println!("DATASET AUDIT ({} observations)", audit.total_observations);
    println!();
    println!(
        "{:<10} {:>6} {:>7} {:>10} {:>13} {:>10} {:>8} {:>8}",
        "source", "total", "t-test", "anova-site", "anova-habitat", "regression", "chi-site", "kriging"
    );
    for s in &audit.sources {
        println!(
            "{:<10} {:>6} {:>7} {:>10} {:>13} {:>10} {:>8} {:>8}",
            s.source,
            s.observations,
            s.t_test_depth,
            s.anova_site,
            s.anova_habitat,
            s.regression_ph,
            s.chi_species_by_site,
            s.kriging_density
        );
    }
    println!();
    println!("Missing coordinates:        {}", audit.missing_coordinates);
    println!("Outside all station bands:  {}", audit.outside_station_bands);
    println!("Stations with chemistry:    {:?}", audit.stations_with_chemistry);
    println!("Stations without chemistry: {:?}", audit.stations_without_chemistry);
    println!("Species in catalog:         {}", audit.species_catalog);
}
