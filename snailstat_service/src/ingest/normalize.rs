/// Snapshot normalisation
///
/// Turns the document-store snapshot into canonical [`Dataset`] records.
/// Stored documents have drifted over time, so field aliases are resolved
/// here once and the engines only ever see one shape:
///
/// | canonical       | accepted document fields                          |
/// |-----------------|---------------------------------------------------|
/// | species         | `species`, `species_name`                         |
/// | depth_m         | `depth_m`, `depth`                                |
/// | coordinates     | `coordinates`, `location.coordinates`             |
/// | catalog name    | `scientific_name`, `name`                         |
///
/// Coordinates may be `[lng, lat]` or `{lat, lng}`. Numbers may arrive as
/// JSON numbers or numeric strings.
///
/// A record that is not an object, or whose identity fields are unusable
/// (unknown source, unknown station, nameless species), is dropped and
/// counted in the [`NormalizationReport`]. A single bad or wrongly typed
/// field (a negative density, a numeric site) only clears that field.

use crate::logging::{self, Component};
use crate::model::{
    Coordinates, Dataset, FetchError, Observation, ReviewStatus, Source, SpeciesRecord, SpeciesStatus,
    StationId, WaterChemistrySample, UNKNOWN_SPECIES,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OBSERVATIONS_KEY: &str = "snailObservations";
pub const CHEMISTRY_KEY: &str = "waterChemistry";
pub const SPECIES_KEY: &str = "snailSpecies";

// ============================================================================
// Raw document shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    species: Option<Value>,
    #[serde(default)]
    species_name: Option<Value>,
    #[serde(default)]
    species_status: Option<Value>,
    #[serde(default)]
    site: Option<Value>,
    #[serde(default)]
    habitat: Option<Value>,
    #[serde(default)]
    density_per_m2: Option<Value>,
    #[serde(default)]
    depth_m: Option<Value>,
    #[serde(default)]
    depth: Option<Value>,
    #[serde(default)]
    coordinates: Option<Value>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(default)]
    coordinates: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawChemistry {
    #[serde(default)]
    station: Option<String>,
    #[serde(default)]
    avg_ph: Option<Value>,
    #[serde(default)]
    avg_temperature: Option<Value>,
    #[serde(default)]
    avg_dissolved_oxygen: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSpecies {
    #[serde(default)]
    scientific_name: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    status: Option<Value>,
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub received: usize,
    pub kept: usize,
}

impl CollectionReport {
    pub fn dropped(&self) -> usize {
        self.received - self.kept
    }
}

/// Per-collection record counts from one normalisation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub observations: CollectionReport,
    pub water_chemistry: CollectionReport,
    pub species: CollectionReport,
}

impl NormalizationReport {
    pub fn total_dropped(&self) -> usize {
        self.observations.dropped() + self.water_chemistry.dropped() + self.species.dropped()
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Extracts the `data` object from a `{ok, collection, data}` envelope.
///
/// With `allow_bare`, a document that already is the data object (has an
/// observations collection at top level) is accepted as is.
pub fn unwrap_envelope(document: Value, allow_bare: bool) -> Result<Value, FetchError> {
    let Value::Object(mut map) = document else {
        return Err(FetchError::ParseError("snapshot is not a JSON object".into()));
    };

    if map.get("ok").and_then(Value::as_bool) == Some(false) {
        let reason = map
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("store reported failure");
        return Err(FetchError::ParseError(reason.to_string()));
    }

    match map.remove("data") {
        Some(data @ Value::Object(_)) => Ok(data),
        Some(_) => Err(FetchError::ParseError("snapshot `data` is not an object".into())),
        None if allow_bare && map.contains_key(OBSERVATIONS_KEY) => Ok(Value::Object(map)),
        None => Err(FetchError::MissingCollection("data".into())),
    }
}

/// Normalises a snapshot body (envelope or bare data object).
pub fn parse_snapshot(body: &str, allow_bare: bool) -> Result<(Dataset, NormalizationReport), FetchError> {
    let document: Value =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;
    normalize_data(unwrap_envelope(document, allow_bare)?)
}

/// Normalises the `data` object of a snapshot.
///
/// The observations collection is required. Chemistry and the species
/// catalog default to empty when absent.
pub fn normalize_data(data: Value) -> Result<(Dataset, NormalizationReport), FetchError> {
    let Value::Object(mut map) = data else {
        return Err(FetchError::ParseError("snapshot data is not an object".into()));
    };

    let observations = take_collection(&mut map, OBSERVATIONS_KEY, true)?;
    let chemistry = take_collection(&mut map, CHEMISTRY_KEY, false)?;
    let species = take_collection(&mut map, SPECIES_KEY, false)?;

    let mut report = NormalizationReport::default();
    let dataset = Dataset {
        observations: normalize_each(observations, &mut report.observations, observation_from),
        water_chemistry: normalize_each(chemistry, &mut report.water_chemistry, chemistry_from),
        species: normalize_each(species, &mut report.species, species_from),
    };

    if report.total_dropped() > 0 {
        logging::warn(
            Component::Dataset,
            None,
            &format!(
                "dropped malformed records: {} observations, {} chemistry, {} species",
                report.observations.dropped(),
                report.water_chemistry.dropped(),
                report.species.dropped()
            ),
        );
    }
    Ok((dataset, report))
}

fn take_collection(
    map: &mut serde_json::Map<String, Value>,
    key: &str,
    required: bool,
) -> Result<Vec<Value>, FetchError> {
    match map.remove(key) {
        Some(Value::Array(records)) => Ok(records),
        Some(Value::Null) | None if !required => {
            logging::debug(Component::Dataset, Some(key), "collection absent, treating as empty");
            Ok(Vec::new())
        }
        None | Some(Value::Null) => Err(FetchError::MissingCollection(key.to_string())),
        Some(_) => Err(FetchError::ParseError(format!("collection {} is not an array", key))),
    }
}

fn normalize_each<R, T>(
    records: Vec<Value>,
    report: &mut CollectionReport,
    convert: impl Fn(R) -> Option<T>,
) -> Vec<T>
where
    R: for<'de> Deserialize<'de>,
{
    report.received = records.len();
    let kept: Vec<T> = records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<R>(record).ok())
        .filter_map(convert)
        .collect();
    report.kept = kept.len();
    kept
}

// ============================================================================
// Record conversion
// ============================================================================

fn observation_from(raw: RawObservation) -> Option<Observation> {
    // Untagged documents were all written by the scientist import.
    let source = match raw.source.as_deref().map(str::trim) {
        None | Some("") => Source::Scientist,
        Some(label) => label.parse().ok()?,
    };

    let coordinates = raw
        .coordinates
        .as_ref()
        .and_then(coordinates_from)
        .or_else(|| raw.location.as_ref()?.coordinates.as_ref().and_then(coordinates_from));

    Some(Observation {
        id: raw.id.as_ref().and_then(id_from),
        species: non_blank(raw.species)
            .or_else(|| non_blank(raw.species_name))
            .unwrap_or_else(|| UNKNOWN_SPECIES.to_string()),
        species_status: non_blank(raw.species_status).map(|s| SpeciesStatus::from_label(&s)),
        site: non_blank(raw.site),
        habitat: non_blank(raw.habitat),
        density_per_m2: raw.density_per_m2.as_ref().and_then(non_negative),
        depth_m: raw
            .depth_m
            .as_ref()
            .and_then(non_negative)
            .or_else(|| raw.depth.as_ref().and_then(non_negative)),
        coordinates,
        status: non_blank(raw.status)
            .as_deref()
            .and_then(ReviewStatus::from_label)
            .unwrap_or(ReviewStatus::Pending),
        source,
    })
}

fn chemistry_from(raw: RawChemistry) -> Option<WaterChemistrySample> {
    Some(WaterChemistrySample {
        station: StationId::from_label(raw.station.as_deref()?)?,
        avg_ph: raw.avg_ph.as_ref().and_then(number),
        avg_temperature: raw.avg_temperature.as_ref().and_then(number),
        avg_dissolved_oxygen: raw.avg_dissolved_oxygen.as_ref().and_then(number),
    })
}

fn species_from(raw: RawSpecies) -> Option<SpeciesRecord> {
    Some(SpeciesRecord {
        name: non_blank(raw.scientific_name).or_else(|| non_blank(raw.name))?,
        status: non_blank(raw.status)
            .as_deref()
            .map(SpeciesStatus::from_label)
            .unwrap_or(SpeciesStatus::Unknown),
    })
}

// ============================================================================
// Field helpers
// ============================================================================

/// Trimmed text of a string field; blanks and non-strings are `None`.
fn non_blank(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// A finite number from a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn non_negative(value: &Value) -> Option<f64> {
    number(value).filter(|n| *n >= 0.0)
}

fn id_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coordinates_from(value: &Value) -> Option<Coordinates> {
    let (lng, lat) = match value {
        Value::Array(pair) if pair.len() == 2 => (number(&pair[0])?, number(&pair[1])?),
        Value::Object(obj) => (
            number(obj.get("lng").or_else(|| obj.get("lon"))?)?,
            number(obj.get("lat")?)?,
        ),
        _ => return None,
    };
    Some(Coordinates::new(lng, lat))
}
