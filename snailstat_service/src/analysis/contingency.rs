//! Species status by group contingency table, with optional chi-square and
//! Cramér's V over the invasive/native columns.

use crate::analysis::groupings::GroupingField;
use crate::analysis::summary::{finite_or_zero, EPSILON};
use crate::logging;
use crate::model::{Observation, Source, SpeciesStatus};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContingencyRow {
    pub group: String,
    pub invasive: u64,
    pub native: u64,
    pub unknown: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContingencyResult {
    pub table: Vec<ContingencyRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chi2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cramers_v: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    pub chi2: f64,
    pub cramers_v: f64,
}

/// Counts species status per group value, groups in first-seen order.
///
/// Records need both a species status and a value for `field`. With
/// `with_stats` the chi-square and Cramér's V of the table are attached.
pub fn species_status_by(
    observations: &[Observation],
    source: Source,
    field: GroupingField,
    with_stats: bool,
) -> ContingencyResult {
    let mut rows: IndexMap<&str, ContingencyRow> = IndexMap::new();
    let mut total = 0;
    let mut kept = 0;

    for obs in observations.iter().filter(|obs| obs.source == source) {
        total += 1;
        let (Some(status), Some(group)) = (obs.species_status, field.value_of(obs)) else {
            continue;
        };
        kept += 1;
        let row = rows.entry(group).or_insert_with(|| ContingencyRow {
            group: group.to_string(),
            ..ContingencyRow::default()
        });
        match status {
            SpeciesStatus::Invasive => row.invasive += 1,
            SpeciesStatus::Native => row.native += 1,
            SpeciesStatus::Unknown => row.unknown += 1,
        }
    }

    logging::log_filter_summary(&format!("chi_species_by_{}", field.as_str()), source, total, kept);

    let table: Vec<ContingencyRow> = rows.into_values().collect();
    let stats = with_stats.then(|| cramers_v(&table));
    ContingencyResult {
        chi2: stats.map(|s| s.chi2),
        cramers_v: stats.map(|s| s.cramers_v),
        table,
    }
}

/// Chi-square and Cramér's V of the invasive/native reduction of `table`.
///
/// Rows with neither invasive nor native counts carry no information in the
/// reduction and are left out. Cells with a zero expected count add nothing.
/// With fewer than two informative rows both statistics are zero.
pub fn cramers_v(table: &[ContingencyRow]) -> Association {
    let rows: Vec<[f64; 2]> = table
        .iter()
        .filter(|r| r.invasive + r.native > 0)
        .map(|r| [r.invasive as f64, r.native as f64])
        .collect();

    let n: f64 = rows.iter().map(|r| r[0] + r[1]).sum();
    if rows.len() < 2 || n < EPSILON {
        return Association {
            chi2: 0.0,
            cramers_v: 0.0,
        };
    }

    let col_sums = [rows.iter().map(|r| r[0]).sum::<f64>(), rows.iter().map(|r| r[1]).sum::<f64>()];
    let mut chi2 = 0.0;
    for row in &rows {
        let row_sum = row[0] + row[1];
        for (observed, col_sum) in row.iter().zip(col_sums) {
            let expected = row_sum * col_sum / n;
            if expected < EPSILON {
                continue;
            }
            chi2 += (observed - expected).powi(2) / expected;
        }
    }

    // Two columns, so min(rows - 1, cols - 1) is always 1 here.
    let k = (rows.len() - 1).min(1) as f64;
    let v = finite_or_zero((chi2 / n / k).sqrt()).clamp(0.0, 1.0);
    Association {
        chi2: finite_or_zero(chi2),
        cramers_v: v,
    }
}
