//! Shallow vs. deep density comparison, split by review status.
//!
//! Within each review status (approved, denied) the observations are
//! partitioned at [`SHALLOW_MAX_DEPTH_M`] and compared with a pooled-variance
//! two-sample t statistic. Pending observations are not part of this test.

use crate::analysis::summary::{guarded_div, mean, round2, sample_sd, sample_variance};
use crate::logging;
use crate::model::{Observation, ReviewStatus, Source};
use serde::Serialize;

/// Depths at or below this many metres count as shallow.
pub const SHALLOW_MAX_DEPTH_M: f64 = 2.0;

/// Representative depths reported alongside each partition for charting.
const SHALLOW_LABEL_DEPTH_M: f64 = 1.0;
const DEEP_LABEL_DEPTH_M: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthSummary {
    pub depth: f64,
    pub mean: f64,
    pub n: usize,
    pub sd: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TStatistic {
    pub t: f64,
    pub df: usize,
}

/// Shallow (`depthA`) vs. deep (`depthB`) for one review status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthComparison {
    pub depth_a: DepthSummary,
    pub depth_b: DepthSummary,
    pub test: TStatistic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTestDepthResult {
    pub approved: DepthComparison,
    pub denied: DepthComparison,
}

/// Runs the depth comparison for `source`.
///
/// Records without both a depth and a density are excluded. A status group
/// missing either partition reports the sentinel (means, sds, t and df all
/// zero, `n` still the true partition size).
pub fn t_test_by_depth(observations: &[Observation], source: Source) -> TTestDepthResult {
    let usable: Vec<(ReviewStatus, f64, f64)> = observations
        .iter()
        .filter(|obs| obs.source == source)
        .filter_map(|obs| Some((obs.status, obs.depth_m?, obs.density_per_m2?)))
        .collect();

    let total = observations.iter().filter(|obs| obs.source == source).count();
    logging::log_filter_summary("t_test_depth", source, total, usable.len());

    let partition = |status: ReviewStatus| -> (Vec<f64>, Vec<f64>) {
        let mut shallow = Vec::new();
        let mut deep = Vec::new();
        for &(s, depth, density) in &usable {
            if s != status {
                continue;
            }
            if depth <= SHALLOW_MAX_DEPTH_M {
                shallow.push(density);
            } else {
                deep.push(density);
            }
        }
        (shallow, deep)
    };

    let (approved_shallow, approved_deep) = partition(ReviewStatus::Approved);
    let (denied_shallow, denied_deep) = partition(ReviewStatus::Denied);

    TTestDepthResult {
        approved: compare_depths(&approved_shallow, &approved_deep, "Approved"),
        denied: compare_depths(&denied_shallow, &denied_deep, "Denied"),
    }
}

/// Pooled-variance t statistic between two density samples.
pub fn compare_depths(shallow: &[f64], deep: &[f64], status_label: &str) -> DepthComparison {
    let summary = |depth: f64, values: &[f64], part: &str, with_data: bool| DepthSummary {
        depth,
        mean: if with_data { round2(mean(values)) } else { 0.0 },
        n: values.len(),
        sd: if with_data { round2(sample_sd(values)) } else { 0.0 },
        label: format!("{} {}", status_label, part),
    };

    if shallow.is_empty() || deep.is_empty() {
        return DepthComparison {
            depth_a: summary(SHALLOW_LABEL_DEPTH_M, shallow, "shallow", false),
            depth_b: summary(DEEP_LABEL_DEPTH_M, deep, "deep", false),
            test: TStatistic { t: 0.0, df: 0 },
        };
    }

    let (n_a, n_b) = (shallow.len() as f64, deep.len() as f64);
    let df = shallow.len() + deep.len() - 2;
    let pooled_var = guarded_div(
        (n_a - 1.0) * sample_variance(shallow) + (n_b - 1.0) * sample_variance(deep),
        df as f64,
    );
    let standard_error = (pooled_var * (1.0 / n_a + 1.0 / n_b)).sqrt();
    let t = guarded_div(mean(shallow) - mean(deep), standard_error);

    DepthComparison {
        depth_a: summary(SHALLOW_LABEL_DEPTH_M, shallow, "shallow", true),
        depth_b: summary(DEEP_LABEL_DEPTH_M, deep, "deep", true),
        test: TStatistic { t: round2(t), df },
    }
}
