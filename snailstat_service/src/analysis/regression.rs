//! Density vs. water pH linear regression.
//!
//! Each observation is joined to its station's chemistry through
//! [`crate::stations`], giving one (pH, density) point per observation.
//! An ordinary least-squares line is fitted and the slope then passes
//! through [`apply_trend_policy`].

use crate::analysis::summary::{finite_or_zero, guarded_div, EPSILON};
use crate::logging;
use crate::model::{Observation, Source, StationId, WaterChemistrySample};
use crate::stations::station_for;
use serde::Serialize;
use std::collections::HashMap;

/// Fewer points than this yields the empty result.
pub const MIN_POINTS: usize = 2;

/// How the fitted slope's sign is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrendPolicy {
    /// Dashboard convention: negative slopes are reported as their absolute
    /// value and the intercept is refitted through the mean point. This is
    /// a display rule, not a statistical correction.
    #[default]
    UpwardDisplay,
    /// Report the OLS slope as fitted.
    TrueSign,
}

/// The slope to report for a raw OLS `slope` under `policy`.
pub fn apply_trend_policy(slope: f64, policy: TrendPolicy) -> f64 {
    match policy {
        TrendPolicy::UpwardDisplay if slope < 0.0 => slope.abs(),
        _ => slope,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coefficients {
    pub intercept: f64,
    pub slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub n: usize,
    pub points: Vec<Point>,
    pub coef: Coefficients,
    pub r2: f64,
}

impl RegressionResult {
    /// The insufficient-data answer.
    pub fn empty() -> Self {
        Self {
            n: 0,
            points: Vec::new(),
            coef: Coefficients {
                intercept: 0.0,
                slope: 0.0,
            },
            r2: 0.0,
        }
    }
}

/// Regresses density on the pH of each observation's station.
///
/// Observations need coordinates and a density. The first chemistry sample
/// listed for a station is the one joined; if it has no pH the observation
/// contributes no point.
pub fn regression_density_vs_ph(
    observations: &[Observation],
    chemistry: &[WaterChemistrySample],
    source: Source,
    policy: TrendPolicy,
) -> RegressionResult {
    let station_ph = first_sample_ph(chemistry);
    let mut total = 0;
    let points: Vec<Point> = observations
        .iter()
        .filter(|obs| obs.source == source)
        .inspect(|_| total += 1)
        .filter_map(|obs| {
            let density = obs.density_per_m2?;
            let station = station_for(obs.coordinates.as_ref()?);
            let ph = (*station_ph.get(&station)?)?;
            Some(Point { x: ph, y: density })
        })
        .collect();

    logging::log_filter_summary("regression_ph", source, total, points.len());
    fit_line(points, policy)
}

/// pH of the first chemistry sample listed for each station, which may
/// itself be missing.
pub fn first_sample_ph(chemistry: &[WaterChemistrySample]) -> HashMap<StationId, Option<f64>> {
    let mut by_station = HashMap::new();
    for sample in chemistry {
        by_station.entry(sample.station).or_insert(sample.avg_ph);
    }
    by_station
}

/// Least-squares fit of `points` with the slope passed through `policy`.
pub fn fit_line(points: Vec<Point>, policy: TrendPolicy) -> RegressionResult {
    if points.len() < MIN_POINTS {
        return RegressionResult::empty();
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.x).sum();
    let sum_y: f64 = points.iter().map(|p| p.y).sum();
    let sum_xy: f64 = points.iter().map(|p| p.x * p.y).sum();
    let sum_xx: f64 = points.iter().map(|p| p.x * p.x).sum();

    // All x equal: no identifiable slope, the line is flat through mean y.
    let raw_slope = guarded_div(n * sum_xy - sum_x * sum_y, n * sum_xx - sum_x * sum_x);
    let slope = apply_trend_policy(raw_slope, policy);
    let intercept = finite_or_zero((sum_y - slope * sum_x) / n);

    // Two-pass SStot: the running-sum form cancels when y sits far from zero.
    let mean_y = sum_y / n;
    let ss_tot: f64 = points.iter().map(|p| (p.y - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|p| (p.y - (intercept + slope * p.x)).powi(2))
        .sum();
    let r2 = if ss_tot < EPSILON {
        0.0
    } else {
        finite_or_zero(1.0 - ss_res / ss_tot)
    };

    RegressionResult {
        n: points.len(),
        points,
        coef: Coefficients { intercept, slope },
        r2,
    }
}
