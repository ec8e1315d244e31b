/// End-to-end analytics scenarios through `AnalyticsService`
///
/// These tests drive the service the way the CLI does (query map in, JSON
/// envelope out) against in-memory providers and a manual clock, so cache
/// expiry and fetch failures can be exercised deterministically.
///
/// Run with: cargo test --test analytics_scenarios

use snailstat_service::cache::ManualClock;
use snailstat_service::config::ServiceConfig;
use snailstat_service::ingest::synthetic::SyntheticDatasetProvider;
use snailstat_service::ingest::DatasetProvider;
use snailstat_service::model::{
    Coordinates, Dataset, FetchError, Observation, ReviewStatus, Source, StationId, WaterChemistrySample,
};
use snailstat_service::service::{AnalyticsRequest, AnalyticsService, Operation};

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Serves a fixed dataset, counting fetches; can be switched to fail.
struct FixtureProvider {
    dataset: Dataset,
    fetches: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<FetchError>>>,
}

impl DatasetProvider for FixtureProvider {
    fn fetch(&self) -> Result<Dataset, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(self.dataset.clone()),
        }
    }

    fn describe(&self) -> String {
        "fixture".into()
    }
}

struct Harness {
    service: AnalyticsService,
    clock: Arc<ManualClock>,
    fetches: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<FetchError>>>,
}

fn harness(dataset: Dataset) -> Harness {
    let fetches = Arc::new(AtomicUsize::new(0));
    let failure = Arc::new(Mutex::new(None));
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()));
    let provider = FixtureProvider {
        dataset,
        fetches: fetches.clone(),
        failure: failure.clone(),
    };
    let service = AnalyticsService::new(Box::new(provider), &ServiceConfig::default(), clock.clone());
    Harness {
        service,
        clock,
        fetches,
        failure,
    }
}

fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn scientist(status: ReviewStatus, depth: f64, density: f64) -> Observation {
    Observation {
        status,
        depth_m: Some(depth),
        density_per_m2: Some(density),
        ..Observation::new(Source::Scientist)
    }
}

fn at_site(site: &str, density: f64) -> Observation {
    Observation {
        site: Some(site.into()),
        density_per_m2: Some(density),
        ..Observation::new(Source::Scientist)
    }
}

/// Walks a JSON value and fails on any non-finite number.
fn assert_all_finite(value: &Value, path: &str) {
    match value {
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            assert!(f.is_finite(), "non-finite number at {}", path);
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                assert_all_finite(item, &format!("{}[{}]", path, i));
            }
        }
        Value::Object(fields) => {
            for (k, v) in fields {
                assert_all_finite(v, &format!("{}.{}", path, k));
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Engine scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_depth_t_test_splits_by_review_status() {
    let h = harness(Dataset {
        observations: vec![
            scientist(ReviewStatus::Approved, 1.0, 10.0),
            scientist(ReviewStatus::Approved, 3.0, 20.0),
            scientist(ReviewStatus::Denied, 1.0, 5.0),
            scientist(ReviewStatus::Denied, 3.0, 5.0),
        ],
        ..Dataset::default()
    });

    let response = h.service.respond(&query(&[("endpoint", "t_test_depth"), ("source", "scientist")]));
    assert_eq!(response["ok"], json!(true));
    assert_eq!(response["source"], json!("scientist"));

    let approved = &response["approved"];
    assert_eq!(approved["depthA"]["mean"], json!(10.0));
    assert_eq!(approved["depthB"]["mean"], json!(20.0));
    assert_eq!(approved["depthA"]["n"], json!(1));
    assert_eq!(approved["depthB"]["n"], json!(1));
    assert_eq!(approved["depthA"]["sd"], json!(0.0), "n=1 variance is zero-guarded");

    let denied = &response["denied"];
    assert_eq!(denied["depthA"]["mean"], json!(5.0));
    assert_eq!(denied["depthB"]["mean"], json!(5.0));
    assert_all_finite(&response, "t_test_depth");
}

#[test]
fn test_group_means_by_site_keep_first_seen_order() {
    let h = harness(Dataset {
        observations: vec![at_site("A", 10.0), at_site("A", 30.0), at_site("B", 20.0)],
        ..Dataset::default()
    });

    for endpoint in ["anova_beach", "anova_site"] {
        let response = h.service.respond(&query(&[("endpoint", endpoint)]));
        assert_eq!(
            response["groups"],
            json!([
                {"group": "A", "n": 2, "mean": 20.0},
                {"group": "B", "n": 1, "mean": 20.0}
            ]),
            "endpoint {}",
            endpoint
        );
    }
}

#[test]
fn test_regression_without_chemistry_is_exact_sentinel() {
    let h = harness(Dataset {
        observations: vec![at_site("A", 10.0)],
        ..Dataset::default()
    });
    let response = h.service.respond(&query(&[("endpoint", "regression_waterlevel")]));
    assert_eq!(
        response,
        json!({
            "ok": true,
            "source": "scientist",
            "n": 0,
            "points": [],
            "coef": {"intercept": 0.0, "slope": 0.0},
            "r2": 0.0
        })
    );
}

#[test]
fn test_regression_reports_upward_slope() {
    let located = |lng: f64, lat: f64, density: f64| Observation {
        density_per_m2: Some(density),
        coordinates: Some(Coordinates::new(lng, lat)),
        ..Observation::new(Source::Scientist)
    };
    let chemistry = |station: StationId, ph: f64| WaterChemistrySample {
        station,
        avg_ph: Some(ph),
        avg_temperature: None,
        avg_dissolved_oxygen: None,
    };
    // Station A (pH 7.0) dense, station C (pH 8.0) sparse: the fitted slope is negative.
    let h = harness(Dataset {
        observations: vec![located(35.55, 32.75, 40.0), located(35.75, 32.95, 10.0)],
        water_chemistry: vec![chemistry(StationId::A, 7.0), chemistry(StationId::C, 8.0)],
        species: Vec::new(),
    });

    let response = h.service.respond(&query(&[("endpoint", "regression_ph")]));
    assert_eq!(response["n"], json!(2));
    let slope = response["coef"]["slope"].as_f64().unwrap();
    assert!(slope > 0.0, "slope is displayed upward, got {}", slope);
}

#[test]
fn test_species_by_with_stats_includes_association() {
    let obs = |site: &str, status| Observation {
        site: Some(site.into()),
        species_status: Some(status),
        ..Observation::new(Source::Citizen)
    };
    use snailstat_service::model::SpeciesStatus::{Invasive, Native};
    let h = harness(Dataset {
        observations: vec![obs("Kursi", Invasive), obs("Kursi", Invasive), obs("Ginosar", Native)],
        ..Dataset::default()
    });

    let response = h.service.respond(&query(&[
        ("endpoint", "chi_species_by"),
        ("source", "citizen"),
        ("by", "beach"),
        ("stats", "true"),
    ]));
    assert_eq!(response["table"][0]["group"], json!("Kursi"));
    let v = response["cramersV"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&v));
    assert!(response.get("chi2").is_some());

    let plain = h.service.respond(&query(&[("endpoint", "chi_species_by"), ("source", "citizen")]));
    assert!(plain.get("chi2").is_none(), "stats are opt-in");
}

#[test]
fn test_kriging_grid_is_capped() {
    let h = harness(SyntheticDatasetProvider::new(11).generate());
    let response = h.service.respond(&query(&[("endpoint", "kriging_map"), ("grid", "400")]));
    assert_eq!(response["size"], json!({"width": 150, "height": 150}));
    assert_eq!(response["grid"].as_array().map(Vec::len), Some(150 * 150));

    let vmin = response["vmin"].as_f64().unwrap();
    let vmax = response["vmax"].as_f64().unwrap();
    for cell in response["grid"].as_array().unwrap() {
        let v = cell.as_f64().unwrap();
        assert!(vmin <= v && v <= vmax);
    }
}

#[test]
fn test_synthetic_dataset_outputs_are_finite() {
    let h = harness(SyntheticDatasetProvider::new(5).generate());
    for source in ["scientist", "citizen", "reports"] {
        for op in Operation::ALL {
            let response = h.service.respond(&query(&[
                ("endpoint", op.name()),
                ("source", source),
                ("stats", "true"),
                ("grid", "20"),
            ]));
            assert_eq!(response["ok"], json!(true), "{} for {}", op.name(), source);
            assert_all_finite(&response, op.name());
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_endpoint_and_bad_parameters() {
    let h = harness(Dataset::default());

    let unknown = h.service.respond(&query(&[("endpoint", "anova_depth")]));
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(unknown["kind"], json!("unknown_endpoint"));

    let bad_source = h.service.respond(&query(&[("endpoint", "t_test_depth"), ("source", "lab")]));
    assert_eq!(bad_source["kind"], json!("invalid_parameter"));

    let bad_field = h.service.respond(&query(&[("endpoint", "kriging_map"), ("field", "ph")]));
    assert_eq!(bad_field["kind"], json!("unsupported_field"));

    assert_eq!(h.fetches.load(Ordering::SeqCst), 0, "rejected requests never fetch");
}

#[test]
fn test_fetch_failure_is_data_unavailable_not_a_zero_result() {
    let h = harness(Dataset::default());
    *h.failure.lock().unwrap() = Some(FetchError::HttpError(502));

    let response = h.service.respond(&query(&[("endpoint", "t_test_depth")]));
    assert_eq!(response["ok"], json!(false));
    assert_eq!(response["kind"], json!("data_unavailable"));

    *h.failure.lock().unwrap() = None;
    let recovered = h.service.respond(&query(&[("endpoint", "t_test_depth")]));
    assert_eq!(recovered["ok"], json!(true), "failures are not cached");
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[test]
fn test_repeated_request_is_served_from_cache() {
    let h = harness(SyntheticDatasetProvider::new(2).generate());
    let request = AnalyticsRequest::TTestDepth {
        source: Source::Citizen,
    };

    let first = h.service.handle(&request).unwrap();
    h.clock.advance(Duration::minutes(30));
    let second = h.service.handle(&request).unwrap();

    assert_eq!(first, second);
    assert_eq!(h.fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_results_expire_after_an_hour() {
    let h = harness(SyntheticDatasetProvider::new(2).generate());
    let q = query(&[("endpoint", "species_list")]);

    h.service.respond(&q);
    h.clock.advance(Duration::minutes(59));
    h.service.respond(&q);
    assert_eq!(h.fetches.load(Ordering::SeqCst), 1);

    h.clock.advance(Duration::minutes(1));
    h.service.respond(&q);
    assert_eq!(h.fetches.load(Ordering::SeqCst), 2, "stale result forces a fresh snapshot");
}

#[test]
fn test_different_parameters_are_cached_separately() {
    let h = harness(SyntheticDatasetProvider::new(9).generate());
    let coarse = h.service.respond(&query(&[("endpoint", "kriging_map"), ("grid", "10")]));
    let fine = h.service.respond(&query(&[("endpoint", "kriging_map"), ("grid", "20")]));
    assert_eq!(coarse["size"]["width"], json!(10));
    assert_eq!(fine["size"]["width"], json!(20));

    // Both share one dataset snapshot.
    assert_eq!(h.fetches.load(Ordering::SeqCst), 1);
}
