//! ANOVA-style descriptive grouping.
//!
//! Reports per-group counts and mean densities by site or by habitat. No F
//! statistic is computed; consumers chart the group means directly.

use crate::analysis::summary::round2;
use crate::logging;
use crate::model::{AnalyticsError, Observation, Source};
use indexmap::IndexMap;
use serde::Serialize;
use std::str::FromStr;

/// Categorical observation field used to group records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingField {
    Site,
    Habitat,
}

impl GroupingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingField::Site => "site",
            GroupingField::Habitat => "habitat",
        }
    }

    /// Name the dashboard uses for this grouping in `by=` and in responses.
    pub fn dashboard_label(&self) -> &'static str {
        match self {
            GroupingField::Site => "beach",
            GroupingField::Habitat => "habitat",
        }
    }

    /// The record's value for this field, if present.
    pub fn value_of<'a>(&self, obs: &'a Observation) -> Option<&'a str> {
        match self {
            GroupingField::Site => obs.site.as_deref(),
            GroupingField::Habitat => obs.habitat.as_deref(),
        }
    }
}

impl FromStr for GroupingField {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // "beach" is what the dashboard has always called a site.
            "site" | "beach" => Ok(GroupingField::Site),
            "habitat" => Ok(GroupingField::Habitat),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "cannot group by '{}' (expected site or habitat)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub group: String,
    pub n: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMeans {
    pub groups: Vec<GroupMean>,
}

/// Mean density per group, in first-seen group order.
pub fn group_means(observations: &[Observation], source: Source, field: GroupingField) -> GroupMeans {
    let mut groups: IndexMap<&str, (usize, f64)> = IndexMap::new();
    let mut total = 0;

    for obs in observations.iter().filter(|obs| obs.source == source) {
        total += 1;
        let (Some(group), Some(density)) = (field.value_of(obs), obs.density_per_m2) else {
            continue;
        };
        let entry = groups.entry(group).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += density;
    }

    let kept = groups.values().map(|(n, _)| *n).sum::<usize>();
    logging::log_filter_summary(&format!("anova_{}", field.as_str()), source, total, kept);

    GroupMeans {
        groups: groups
            .into_iter()
            .map(|(group, (n, sum))| GroupMean {
                group: group.to_string(),
                n,
                mean: round2(sum / n as f64),
            })
            .collect(),
    }
}
