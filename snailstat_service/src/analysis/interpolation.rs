//! Gaussian-kernel spatial interpolation ("kriging" on the dashboard map).
//!
//! The surface is a kernel-weighted average of every observation, not true
//! geostatistical kriging: no variogram is fitted. Bandwidth adapts to the
//! spread of the data with a floor so tightly clustered points still blend.
//!
//! Cost is `grid² × points`, which is why the grid edge is capped at
//! [`MAX_GRID_SIZE`].

use crate::analysis::summary::finite_or_zero;
use crate::logging;
use crate::model::{AnalyticsError, Coordinates, Observation, Source};
use serde::Serialize;
use std::str::FromStr;

pub const MAX_GRID_SIZE: usize = 150;
pub const DEFAULT_GRID_SIZE: usize = 100;

/// Bounding box padding, as a fraction of the larger coordinate range.
const PADDING_FRACTION: f64 = 0.1;
/// Kernel sigma, as a fraction of the larger coordinate range.
const BANDWIDTH_FRACTION: f64 = 0.1;
/// Sigma floor in degrees.
const MIN_BANDWIDTH: f64 = 0.01;
/// Grid nodes closer than this (degrees) to a point take its value exactly.
const COINCIDENCE_EPSILON: f64 = 1e-4;

/// Numeric observation field that can be interpolated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterpolationField {
    #[default]
    DensityPerM2,
    DepthM,
}

impl InterpolationField {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationField::DensityPerM2 => "density_per_m2",
            InterpolationField::DepthM => "depth_m",
        }
    }

    pub fn value_of(&self, obs: &Observation) -> Option<f64> {
        match self {
            InterpolationField::DensityPerM2 => obs.density_per_m2,
            InterpolationField::DepthM => obs.depth_m,
        }
    }
}

impl FromStr for InterpolationField {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "density_per_m2" | "density" => Ok(InterpolationField::DensityPerM2),
            "depth_m" | "depth" => Ok(InterpolationField::DepthM),
            other => Err(AnalyticsError::UnsupportedField(other.to_string())),
        }
    }
}

/// Geographic extent of the grid; x is longitude, y is latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSize {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpolationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub size: GridSize,
    /// Row-major by latitude: `grid[i * width + j]` is the node at
    /// latitude step `i`, longitude step `j`. Nodes sit at cell corners
    /// (`bbox.min + i * step`), not centres.
    pub grid: Vec<f64>,
    pub vmin: f64,
    pub vmax: f64,
    pub source: Source,
    pub field: &'static str,
    pub species: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationRequest<'a> {
    pub source: Source,
    pub field: InterpolationField,
    /// Exact species name to restrict to; `None` or empty means all species.
    pub species: Option<&'a str>,
    pub grid_size: usize,
}

impl Default for InterpolationRequest<'_> {
    fn default() -> Self {
        Self {
            source: Source::default(),
            field: InterpolationField::default(),
            species: None,
            grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

/// Effective grid edge for a requested size.
pub fn effective_grid_size(requested: usize) -> usize {
    requested.clamp(1, MAX_GRID_SIZE)
}

/// Interpolates the requested field over a square grid covering the
/// observations. No matching observations gives a 0×0 grid.
pub fn interpolate(observations: &[Observation], request: &InterpolationRequest<'_>) -> InterpolationResult {
    let species = request.species.filter(|s| !s.is_empty());
    let mut total = 0;
    let points: Vec<(Coordinates, f64)> = observations
        .iter()
        .filter(|obs| obs.source == request.source)
        .inspect(|_| total += 1)
        .filter(|obs| species.is_none_or(|name| obs.species == name))
        .filter_map(|obs| Some((obs.coordinates?, request.field.value_of(obs)?)))
        .collect();

    logging::log_filter_summary("kriging_map", request.source, total, points.len());

    let mut result = InterpolationResult {
        bbox: None,
        size: GridSize { width: 0, height: 0 },
        grid: Vec::new(),
        vmin: 0.0,
        vmax: 0.0,
        source: request.source,
        field: request.field.as_str(),
        species: species.map(str::to_string),
    };
    if points.is_empty() {
        return result;
    }

    let (lat_lo, lat_hi) = extent(points.iter().map(|(c, _)| c.lat));
    let (lng_lo, lng_hi) = extent(points.iter().map(|(c, _)| c.lng));
    let spread = (lat_hi - lat_lo).max(lng_hi - lng_lo);
    let padding = spread * PADDING_FRACTION;
    let bbox = BoundingBox {
        min_x: lng_lo - padding,
        min_y: lat_lo - padding,
        max_x: lng_hi + padding,
        max_y: lat_hi + padding,
    };

    let size = effective_grid_size(request.grid_size);
    let lat_step = (bbox.max_y - bbox.min_y) / size as f64;
    let lng_step = (bbox.max_x - bbox.min_x) / size as f64;
    let sigma = (spread * BANDWIDTH_FRACTION).max(MIN_BANDWIDTH);

    let mut grid = Vec::with_capacity(size * size);
    for i in 0..size {
        let lat = bbox.min_y + i as f64 * lat_step;
        for j in 0..size {
            let lng = bbox.min_x + j as f64 * lng_step;
            grid.push(kernel_estimate(&points, lng, lat, sigma));
        }
    }

    let (vmin, vmax) = extent(grid.iter().copied());
    result.bbox = Some(bbox);
    result.size = GridSize { width: size, height: size };
    result.grid = grid;
    result.vmin = vmin;
    result.vmax = vmax;
    result
}

/// Gaussian-weighted average of `points` at (lng, lat). A point within
/// [`COINCIDENCE_EPSILON`] wins outright; the first such point in input order
/// is used.
fn kernel_estimate(points: &[(Coordinates, f64)], lng: f64, lat: f64, sigma: f64) -> f64 {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;

    for (coords, value) in points {
        let dist_sq = (coords.lat - lat).powi(2) + (coords.lng - lng).powi(2);
        if dist_sq.sqrt() < COINCIDENCE_EPSILON {
            return *value;
        }
        let weight = (-dist_sq / two_sigma_sq).exp();
        weighted_sum += value * weight;
        weight_sum += weight;
    }

    // Far from every point the weights underflow to zero.
    if weight_sum > 0.0 {
        finite_or_zero(weighted_sum / weight_sum)
    } else {
        0.0
    }
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
