//! Analytics request handling.
//!
//! [`AnalyticsService`] turns a query (`endpoint=...&source=...`) into a
//! typed [`AnalyticsRequest`], answers it from the result cache when fresh,
//! and otherwise pulls the (separately cached) dataset snapshot and runs the
//! matching engine. Responses are JSON envelopes:
//!
//! ```text
//! success: { "ok": true,  "source": "scientist", ...result }
//! failure: { "ok": false, "error": "...", "kind": "invalid_parameter" }
//! ```
//!
//! A fetch failure is always a failure envelope. Empty results after a
//! successful fetch are success envelopes carrying the engine's sentinel.

use crate::analysis::{
    group_means, interpolate, regression_density_vs_ph, species_list, species_status_by, t_test_by_depth,
    GroupingField, InterpolationField, InterpolationRequest, TrendPolicy,
};
use crate::analysis::interpolation::effective_grid_size;
use crate::cache::{Clock, ResultCache, SystemClock};
use crate::config::ServiceConfig;
use crate::ingest::{CachedDataset, DatasetProvider};
use crate::logging::{self, Component};
use crate::model::{AnalyticsError, Dataset, Result, Source};
use chrono::Duration;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    TTestDepth,
    AnovaSite,
    AnovaHabitat,
    RegressionPh,
    ChiSpeciesBy,
    KrigingMap,
    SpeciesList,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::TTestDepth,
        Operation::AnovaSite,
        Operation::AnovaHabitat,
        Operation::RegressionPh,
        Operation::ChiSpeciesBy,
        Operation::KrigingMap,
        Operation::SpeciesList,
    ];

    /// Endpoint name as the dashboard requests it.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::TTestDepth => "t_test_depth",
            Operation::AnovaSite => "anova_beach",
            Operation::AnovaHabitat => "anova_habitat",
            Operation::RegressionPh => "regression_waterlevel",
            Operation::ChiSpeciesBy => "chi_species_by",
            Operation::KrigingMap => "kriging_map",
            Operation::SpeciesList => "species_list",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Operation::AnovaSite => &["anova_site"],
            Operation::RegressionPh => &["regression_ph"],
            _ => &[],
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == name || op.aliases().contains(&name))
            .ok_or_else(|| AnalyticsError::UnknownEndpoint(name.to_string()))
    }

    fn parameters(&self) -> &'static [&'static str] {
        match self {
            Operation::ChiSpeciesBy => &["source", "by", "stats"],
            Operation::KrigingMap => &["source", "field", "species", "grid"],
            Operation::SpeciesList => &[],
            _ => &["source"],
        }
    }

    fn example(&self) -> &'static str {
        match self {
            Operation::TTestDepth => "?endpoint=t_test_depth&source=scientist",
            Operation::AnovaSite => "?endpoint=anova_beach&source=scientist",
            Operation::AnovaHabitat => "?endpoint=anova_habitat&source=citizen",
            Operation::RegressionPh => "?endpoint=regression_waterlevel&source=scientist",
            Operation::ChiSpeciesBy => "?endpoint=chi_species_by&by=beach&source=scientist&stats=true",
            Operation::KrigingMap => {
                "?endpoint=kriging_map&source=scientist&field=density_per_m2&species=Melanoides%20tuberculata&grid=100"
            }
            Operation::SpeciesList => "?endpoint=species_list",
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A fully parsed analytics request.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsRequest {
    TTestDepth {
        source: Source,
    },
    GroupMeans {
        source: Source,
        field: GroupingField,
    },
    RegressionPh {
        source: Source,
    },
    SpeciesBy {
        source: Source,
        by: GroupingField,
        stats: bool,
    },
    KrigingMap {
        source: Source,
        field: InterpolationField,
        species: Option<String>,
        grid_size: usize,
    },
    SpeciesList,
}

impl AnalyticsRequest {
    /// Parses query parameters. `endpoint` is required; `source` defaults to
    /// scientist; a kriging request without `grid` uses `default_grid_size`.
    pub fn from_query(query: &HashMap<String, String>, default_grid_size: usize) -> Result<Self> {
        let arg = |key: &str| param(query, key);

        let endpoint = arg("endpoint")
            .ok_or_else(|| AnalyticsError::InvalidParameter("missing endpoint".into()))?;
        let operation = Operation::from_name(endpoint)?;
        let source = match arg("source") {
            Some(label) => label.parse::<Source>()?,
            None => Source::default(),
        };

        Ok(match operation {
            Operation::TTestDepth => AnalyticsRequest::TTestDepth { source },
            Operation::AnovaSite => AnalyticsRequest::GroupMeans {
                source,
                field: GroupingField::Site,
            },
            Operation::AnovaHabitat => AnalyticsRequest::GroupMeans {
                source,
                field: GroupingField::Habitat,
            },
            Operation::RegressionPh => AnalyticsRequest::RegressionPh { source },
            Operation::ChiSpeciesBy => AnalyticsRequest::SpeciesBy {
                source,
                by: arg("by").map(str::parse::<GroupingField>).transpose()?.unwrap_or(GroupingField::Site),
                stats: arg("stats").map(parse_flag).transpose()?.unwrap_or(false),
            },
            Operation::KrigingMap => AnalyticsRequest::KrigingMap {
                source,
                field: arg("field").map(str::parse::<InterpolationField>).transpose()?.unwrap_or_default(),
                species: arg("species").map(str::to_string),
                grid_size: match arg("grid") {
                    Some(raw) => raw.parse::<usize>().map_err(|_| {
                        AnalyticsError::InvalidParameter(format!("grid must be a positive integer, got '{}'", raw))
                    })?,
                    None => default_grid_size,
                },
            },
            Operation::SpeciesList => AnalyticsRequest::SpeciesList,
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            AnalyticsRequest::TTestDepth { .. } => Operation::TTestDepth,
            AnalyticsRequest::GroupMeans {
                field: GroupingField::Site,
                ..
            } => Operation::AnovaSite,
            AnalyticsRequest::GroupMeans {
                field: GroupingField::Habitat,
                ..
            } => Operation::AnovaHabitat,
            AnalyticsRequest::RegressionPh { .. } => Operation::RegressionPh,
            AnalyticsRequest::SpeciesBy { .. } => Operation::ChiSpeciesBy,
            AnalyticsRequest::KrigingMap { .. } => Operation::KrigingMap,
            AnalyticsRequest::SpeciesList => Operation::SpeciesList,
        }
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            AnalyticsRequest::TTestDepth { source }
            | AnalyticsRequest::GroupMeans { source, .. }
            | AnalyticsRequest::RegressionPh { source }
            | AnalyticsRequest::SpeciesBy { source, .. }
            | AnalyticsRequest::KrigingMap { source, .. } => Some(*source),
            AnalyticsRequest::SpeciesList => None,
        }
    }

    /// Cache key covering every parameter that changes the result.
    pub fn cache_key(&self) -> String {
        let name = self.operation().name();
        match self {
            AnalyticsRequest::TTestDepth { source }
            | AnalyticsRequest::GroupMeans { source, .. }
            | AnalyticsRequest::RegressionPh { source } => format!("{}_{}", name, source),
            AnalyticsRequest::SpeciesBy { source, by, stats } => {
                format!("{}_{}_{}_stats={}", name, by.as_str(), source, stats)
            }
            AnalyticsRequest::KrigingMap {
                source,
                field,
                species,
                grid_size,
            } => format!(
                "{}_{}_{}_species={}_grid={}",
                name,
                source,
                field.as_str(),
                species.as_deref().unwrap_or(""),
                effective_grid_size(*grid_size)
            ),
            AnalyticsRequest::SpeciesList => name.to_string(),
        }
    }
}

/// A non-blank query parameter.
fn param<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(AnalyticsError::InvalidParameter(format!("expected true or false, got '{}'", other))),
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Description of one endpoint for `endpoints()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointInfo {
    pub endpoint: &'static str,
    pub aliases: &'static [&'static str],
    pub parameters: &'static [&'static str],
    pub example: &'static str,
}

pub fn endpoints() -> Vec<EndpointInfo> {
    Operation::ALL
        .iter()
        .map(|op| EndpointInfo {
            endpoint: op.name(),
            aliases: op.aliases(),
            parameters: op.parameters(),
            example: op.example(),
        })
        .collect()
}

pub struct AnalyticsService {
    dataset: CachedDataset<Box<dyn DatasetProvider>>,
    results: ResultCache<Value>,
    result_max_age: Duration,
    default_grid_size: usize,
    trend_policy: TrendPolicy,
}

impl AnalyticsService {
    pub fn new(provider: Box<dyn DatasetProvider>, config: &ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            dataset: CachedDataset::with_max_age(provider, clock.clone(), config.dataset_max_age()),
            results: ResultCache::new(clock),
            result_max_age: config.result_max_age(),
            default_grid_size: config.interpolation.default_grid_size,
            trend_policy: TrendPolicy::default(),
        }
    }

    /// Service over the configured backend, on wall-clock time.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let provider = config.backend()?.into_provider()?;
        logging::info(Component::Service, Some(&provider.describe()), "analytics service ready");
        Ok(Self::new(provider, config, Arc::new(SystemClock)))
    }

    pub fn with_trend_policy(mut self, policy: TrendPolicy) -> Self {
        self.trend_policy = policy;
        self
    }

    pub fn default_grid_size(&self) -> usize {
        self.default_grid_size
    }

    /// Computes (or recalls) the result payload for `request`.
    pub fn handle(&self, request: &AnalyticsRequest) -> Result<Value> {
        let key = self.cache_key(request);
        self.results.try_get_or_compute(&key, self.result_max_age, || {
            let dataset = self.dataset.snapshot()?;
            logging::debug(Component::Service, Some(&key), "computing");
            self.compute(request, &dataset)
        })
    }

    /// Parses `query`, handles it, and wraps the outcome in an envelope.
    pub fn respond(&self, query: &HashMap<String, String>) -> Value {
        let outcome = AnalyticsRequest::from_query(query, self.default_grid_size)
            .and_then(|request| Ok((request.source(), self.handle(&request)?)));
        match outcome {
            Ok((source, payload)) => success_envelope(source, payload),
            Err(err) => {
                logging::warn(Component::Service, Some(err.kind()), &err.to_string());
                error_envelope(&err)
            }
        }
    }

    /// Runs the engine for `request` against `dataset`, bypassing caches.
    pub fn compute(&self, request: &AnalyticsRequest, dataset: &Dataset) -> Result<Value> {
        let observations = &dataset.observations;
        let value = match request {
            AnalyticsRequest::TTestDepth { source } => serde_json::to_value(t_test_by_depth(observations, *source))?,
            AnalyticsRequest::GroupMeans { source, field } => {
                serde_json::to_value(group_means(observations, *source, *field))?
            }
            AnalyticsRequest::RegressionPh { source } => serde_json::to_value(regression_density_vs_ph(
                observations,
                &dataset.water_chemistry,
                *source,
                self.trend_policy,
            ))?,
            AnalyticsRequest::SpeciesBy { source, by, stats } => {
                let mut payload = serde_json::to_value(species_status_by(observations, *source, *by, *stats))?;
                if let Value::Object(fields) = &mut payload {
                    fields.insert("by".into(), json!(by.dashboard_label()));
                }
                payload
            }
            AnalyticsRequest::KrigingMap {
                source,
                field,
                species,
                grid_size,
            } => serde_json::to_value(interpolate(
                observations,
                &InterpolationRequest {
                    source: *source,
                    field: *field,
                    species: species.as_deref(),
                    grid_size: *grid_size,
                },
            ))?,
            AnalyticsRequest::SpeciesList => serde_json::to_value(species_list(&dataset.species))?,
        };
        Ok(value)
    }

    fn cache_key(&self, request: &AnalyticsRequest) -> String {
        match (request, self.trend_policy) {
            (AnalyticsRequest::RegressionPh { .. }, TrendPolicy::TrueSign) => {
                format!("{}_true_sign", request.cache_key())
            }
            _ => request.cache_key(),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

pub fn success_envelope(source: Option<Source>, payload: Value) -> Value {
    let mut body = Map::new();
    body.insert("ok".into(), Value::Bool(true));
    if let Some(source) = source {
        body.insert("source".into(), json!(source));
    }
    match payload {
        Value::Object(fields) => body.extend(fields),
        other => {
            body.insert("result".into(), other);
        }
    }
    Value::Object(body)
}

pub fn error_envelope(err: &AnalyticsError) -> Value {
    json!({
        "ok": false,
        "error": err.to_string(),
        "kind": err.kind(),
    })
}
