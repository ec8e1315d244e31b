/// Statistical engines behind the analytics endpoints.
///
/// Every engine is a pure function of an observation slice and a source.
/// Records missing a field an engine needs are excluded; an engine with
/// nothing left to work on returns its zeroed sentinel result instead of an
/// error. Numeric outputs never carry NaN or infinity.
///
/// Submodules:
/// - `summary`: shared descriptive helpers and finite guards.
/// - `ttest`: shallow vs. deep pooled t statistic by review status.
/// - `groupings`: ANOVA-style group means by site or habitat.
/// - `regression`: density vs. station pH least squares with trend policy.
/// - `contingency`: species status tables, chi-square and Cramér's V.
/// - `interpolation`: Gaussian-kernel grid for the density map.
/// - `species`: species catalog listing.

pub mod contingency;
pub mod groupings;
pub mod interpolation;
pub mod regression;
pub mod species;
pub mod summary;
pub mod ttest;

pub use contingency::{species_status_by, ContingencyResult, ContingencyRow};
pub use groupings::{group_means, GroupMeans, GroupingField};
pub use interpolation::{interpolate, InterpolationField, InterpolationRequest, InterpolationResult};
pub use regression::{regression_density_vs_ph, RegressionResult, TrendPolicy};
pub use species::{species_list, SpeciesList};
pub use ttest::{t_test_by_depth, TTestDepthResult};
