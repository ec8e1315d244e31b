/// Core data types for the snail observation analytics service.
///
/// Label parsing is the only logic here. These are the canonical record
/// shapes: the ingest layer is responsible for turning whatever the
/// document store hands back into these types, so the engines never need to
/// fall back between differently-named fields.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Provenance of an observation. Every analytics operation filters on this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Scientist,
    Citizen,
    /// Observations derived from user-submitted reports.
    Reports,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Scientist, Source::Citizen, Source::Reports];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Scientist => "scientist",
            Source::Citizen => "citizen",
            Source::Reports => "reports",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scientist" => Ok(Source::Scientist),
            "citizen" => Ok(Source::Citizen),
            "reports" | "report" => Ok(Source::Reports),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown source '{}' (expected scientist, citizen or reports)",
                other
            ))),
        }
    }
}

/// Review status of a submitted observation. Not to be confused with
/// [`SpeciesStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Approved,
    Denied,
    Pending,
}

impl ReviewStatus {
    /// Parses a stored status label. Returns `None` for labels outside the
    /// closed vocabulary.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(ReviewStatus::Approved),
            "denied" => Some(ReviewStatus::Denied),
            "pending" => Some(ReviewStatus::Pending),
            _ => None,
        }
    }
}

/// Whether a species is invasive or native to the lake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesStatus {
    Invasive,
    Native,
    Unknown,
}

impl SpeciesStatus {
    /// Any label other than invasive/native counts as unknown.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "invasive" => SpeciesStatus::Invasive,
            "native" => SpeciesStatus::Native,
            _ => SpeciesStatus::Unknown,
        }
    }
}

/// Monitoring station identifiers used to join chemistry onto observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StationId {
    A,
    B,
    C,
    D,
    E,
}

impl StationId {
    pub const ALL: [StationId; 5] = [
        StationId::A,
        StationId::B,
        StationId::C,
        StationId::D,
        StationId::E,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StationId::A => "A",
            StationId::B => "B",
            StationId::C => "C",
            StationId::D => "D",
            StationId::E => "E",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "A" => Some(StationId::A),
            "B" => Some(StationId::B),
            "C" => Some(StationId::C),
            "D" => Some(StationId::D),
            "E" => Some(StationId::E),
            _ => None,
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// WGS84 position, stored longitude-first like the document store does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinates {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// One sampled snail observation in canonical form.
///
/// Optional fields are `None` when the stored document lacked them or held
/// an unusable value. Engines exclude such records from the tests that need
/// the field; nothing is ever defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: Option<String>,
    /// Scientific name, or "Unknown".
    pub species: String,
    pub species_status: Option<SpeciesStatus>,
    pub site: Option<String>,
    pub habitat: Option<String>,
    pub density_per_m2: Option<f64>,
    pub depth_m: Option<f64>,
    pub coordinates: Option<Coordinates>,
    pub status: ReviewStatus,
    pub source: Source,
}

impl Observation {
    /// A bare observation with only provenance set; test and generator code
    /// fill in the rest with struct update syntax.
    pub fn new(source: Source) -> Self {
        Self {
            id: None,
            species: UNKNOWN_SPECIES.to_string(),
            species_status: None,
            site: None,
            habitat: None,
            density_per_m2: None,
            depth_m: None,
            coordinates: None,
            status: ReviewStatus::Pending,
            source,
        }
    }
}

/// Placeholder species name for unidentified snails.
pub const UNKNOWN_SPECIES: &str = "Unknown";

/// Water chemistry aggregate for one monitoring station.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterChemistrySample {
    pub station: StationId,
    pub avg_ph: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_dissolved_oxygen: Option<f64>,
}

/// Entry from the species catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesRecord {
    pub name: String,
    pub status: SpeciesStatus,
}

/// Everything the analytics layer reads, fetched as one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub observations: Vec<Observation>,
    pub water_chemistry: Vec<WaterChemistrySample>,
    pub species: Vec<SpeciesRecord>,
}

impl Dataset {
    /// Observations from a single source, in stored order.
    pub fn from_source(&self, source: Source) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(move |obs| obs.source == source)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or decoding a dataset snapshot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Non-2xx HTTP response from the data API.
    #[error("HTTP error: {0}")]
    HttpError(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// A local snapshot could not be read.
    #[error("IO error: {0}")]
    Io(String),
    /// The snapshot lacked a required collection.
    #[error("Missing collection: {0}")]
    MissingCollection(String),
}

/// Errors surfaced to callers of the analytics service.
///
/// "No matching data" is not an error: engines answer with zeroed sentinel
/// results instead.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("dataset unavailable: {0}")]
    DataUnavailable(#[from] FetchError),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported interpolation field: {0}")]
    UnsupportedField(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// Stable machine-readable tag for the failure envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::DataUnavailable(_) => "data_unavailable",
            AnalyticsError::InvalidParameter(_) => "invalid_parameter",
            AnalyticsError::UnsupportedField(_) => "unsupported_field",
            AnalyticsError::UnknownEndpoint(_) => "unknown_endpoint",
            AnalyticsError::Config(_) => "config",
            AnalyticsError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
