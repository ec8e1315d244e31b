//! Species catalog listing.

use crate::model::SpeciesRecord;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesList {
    pub species: Vec<String>,
}

/// Catalog names, deduplicated and sorted. Blank names are skipped.
pub fn species_list(catalog: &[SpeciesRecord]) -> SpeciesList {
    let names: BTreeSet<&str> = catalog
        .iter()
        .map(|record| record.name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    SpeciesList {
        species: names.into_iter().map(str::to_string).collect(),
    }
}
