/// Integration tests for dataset providers and verification
///
/// These tests verify:
/// 1. A snapshot exported to disk loads through the file provider
/// 2. Malformed records are dropped and counted, not fatal
/// 3. A TOML configuration resolves to a working service
/// 4. The dataset audit agrees with what the endpoints compute
///
/// The live API test is ignored by default. Point it at a running store with:
///
///   SNAILSTAT_DATASET_URL=https://... cargo test --test dataset_ingest -- --ignored

use snailstat_service::config::ServiceConfig;
use snailstat_service::ingest::file::FileDatasetProvider;
use snailstat_service::ingest::normalize::parse_snapshot;
use snailstat_service::ingest::DatasetProvider;
use snailstat_service::model::{FetchError, ReviewStatus, Source, StationId};
use snailstat_service::service::AnalyticsService;
use snailstat_service::verify::{self, VerificationStatus};

use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn snapshot_document() -> serde_json::Value {
    json!({
        "ok": true,
        "collection": "analytics_data",
        "data": {
            "snailObservations": [
                {
                    "id": "a1",
                    "species": "Melanoides tuberculata",
                    "species_status": "invasive",
                    "site": "Kursi",
                    "habitat": "Rocky",
                    "density_per_m2": 30,
                    "depth_m": 1.2,
                    "coordinates": [35.55, 32.75],
                    "status": "approved",
                    "source": "scientist"
                },
                {
                    "id": "a2",
                    "species_name": "Melanopsis costata",
                    "species_status": "native",
                    "site": "Kursi",
                    "habitat": "Sandy",
                    "density_per_m2": "12.5",
                    "depth": 4,
                    "location": {"coordinates": {"lat": 32.72, "lng": 35.52}},
                    "status": "denied"
                },
                {
                    "id": "a3",
                    "species": "Thiara scabra",
                    "density_per_m2": 8,
                    "source": "citizen"
                },
                {
                    "id": "bad",
                    "source": "satellite"
                }
            ],
            "waterChemistry": [
                {"station": "A", "avg_ph": 7.6, "avg_temperature": 21.0},
                {"station": "Z", "avg_ph": 7.1}
            ],
            "snailSpecies": [
                {"scientific_name": "Melanoides tuberculata", "status": "invasive"},
                {"name": "Melanopsis costata", "status": "native"}
            ]
        }
    })
}

fn write_snapshot(document: &serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp snapshot");
    write!(file, "{}", document).expect("write temp snapshot");
    file
}

fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// ---------------------------------------------------------------------------
// File provider
// ---------------------------------------------------------------------------

#[test]
fn test_file_snapshot_normalises_aliases() {
    let file = write_snapshot(&snapshot_document());
    let dataset = FileDatasetProvider::new(file.path()).fetch().expect("snapshot loads");

    assert_eq!(dataset.observations.len(), 3, "unknown source drops the record");
    let second = &dataset.observations[1];
    assert_eq!(second.species, "Melanopsis costata");
    assert_eq!(second.depth_m, Some(4.0));
    assert_eq!(second.density_per_m2, Some(12.5));
    assert_eq!(second.source, Source::Scientist, "missing source defaults to scientist");
    assert_eq!(second.status, ReviewStatus::Denied);
    let coords = second.coordinates.expect("object coordinates are accepted");
    assert_eq!((coords.lng, coords.lat), (35.52, 32.72));

    assert_eq!(dataset.water_chemistry.len(), 1, "unknown station is dropped");
    assert_eq!(dataset.species.len(), 2);
}

#[test]
fn test_parse_snapshot_reports_dropped_records() {
    let (_, report) = parse_snapshot(&snapshot_document().to_string(), false).unwrap();
    assert_eq!(report.observations.received, 4);
    assert_eq!(report.observations.kept, 3);
    assert_eq!(report.water_chemistry.dropped(), 1);
    assert_eq!(report.total_dropped(), 2);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = FileDatasetProvider::new("/nonexistent/snapshot.json").fetch().unwrap_err();
    assert!(matches!(err, FetchError::Io(_)), "got {:?}", err);
}

// ---------------------------------------------------------------------------
// Config to service
// ---------------------------------------------------------------------------

#[test]
fn test_toml_config_builds_file_backed_service() {
    let snapshot = write_snapshot(&snapshot_document());
    let mut config_file = NamedTempFile::new().unwrap();
    writeln!(
        config_file,
        "[dataset]\npath = {:?}\n\n[interpolation]\ndefault_grid_size = 12\n",
        snapshot.path().display().to_string()
    )
    .unwrap();

    let config = ServiceConfig::from_file(config_file.path()).unwrap();
    config.validate().unwrap();
    let service = AnalyticsService::from_config(&config).unwrap();
    assert_eq!(service.default_grid_size(), 12);

    let species = service.respond(&query(&[("endpoint", "species_list")]));
    assert_eq!(
        species,
        json!({"ok": true, "species": ["Melanoides tuberculata", "Melanopsis costata"]})
    );

    let map = service.respond(&query(&[("endpoint", "kriging_map")]));
    assert_eq!(map["size"], json!({"width": 12, "height": 12}));
}

// ---------------------------------------------------------------------------
// Audit and verification
// ---------------------------------------------------------------------------

#[test]
fn test_audit_of_file_snapshot() {
    let file = write_snapshot(&snapshot_document());
    let dataset = FileDatasetProvider::new(file.path()).fetch().unwrap();
    let audit = verify::audit_dataset(&dataset);

    assert_eq!(audit.total_observations, 3);
    let scientist = audit.sources.iter().find(|s| s.source == "scientist").unwrap();
    assert_eq!(scientist.observations, 2);
    assert_eq!(scientist.t_test_depth, 2);
    assert_eq!(scientist.regression_ph, 2, "both join station A chemistry");
    assert_eq!(audit.missing_coordinates, 1);
    assert_eq!(audit.stations_with_chemistry, vec![StationId::A]);
}

#[test]
fn test_verification_of_unreachable_endpoint_fails() {
    let result = verify::run_endpoint_verification("http://127.0.0.1:9/api", Duration::from_secs(2));
    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(!result.reachable);
    assert!(result.url.ends_with("collection=analytics_data"));
}

#[test]
#[ignore]
fn test_live_endpoint_verification() {
    let url = std::env::var("SNAILSTAT_DATASET_URL").expect("SNAILSTAT_DATASET_URL must be set");
    let result = verify::run_endpoint_verification(&url, Duration::from_secs(30));
    verify::print_verification(&result);
    assert_ne!(result.status, VerificationStatus::Failed, "{:?}", result.error_message);
    assert!(result.observations > 0);
}
