/// Synthetic dataset generator for development
///
/// When no live store is reachable, generate a deterministic lake-shore
/// dataset from a seed so dashboards and analytics can be exercised offline.
/// Densities depend on habitat, coordinates cluster around the monitored
/// bays, and chemistry pH ranges differ per station so every engine has
/// something to find.

use crate::ingest::DatasetProvider;
use crate::model::{
    Coordinates, Dataset, FetchError, Observation, ReviewStatus, Source, SpeciesRecord, SpeciesStatus,
    StationId, WaterChemistrySample,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

pub const DEFAULT_OBSERVATIONS: usize = 500;
pub const DEFAULT_CHEMISTRY_SAMPLES: usize = 200;

const SPECIES: [(&str, SpeciesStatus); 6] = [
    ("Melanoides tuberculata", SpeciesStatus::Invasive),
    ("Thiara scabra", SpeciesStatus::Invasive),
    ("Melanopsis costata", SpeciesStatus::Native),
    ("Bithynia sp.", SpeciesStatus::Native),
    ("Theodoxus jordani", SpeciesStatus::Native),
    ("Unknown", SpeciesStatus::Unknown),
];

const SITES: [&str; 12] = [
    "Ginosar", "Gofra", "Shittim", "Hukok", "Tiberias", "Duga", "Hamat", "Kursi", "Amnun", "Ein Gev",
    "Kfar Nahum", "Tabgha shore",
];

/// Habitat and its (min, max) density per m².
const HABITATS: [(&str, f64, f64); 4] = [
    ("Rocky", 25.0, 60.0),
    ("Mixed", 15.0, 35.0),
    ("Sandy", 5.0, 25.0),
    ("Muddy", 8.0, 20.0),
];

/// (lat, lng) centres observations cluster around.
const CLUSTERS: [(f64, f64); 4] = [(32.8, 35.6), (32.9, 35.7), (32.7, 35.5), (33.0, 35.6)];
const CLUSTER_SPREAD_DEG: f64 = 0.1;

/// Station and its (min, max) average pH.
const STATION_PH: [(StationId, f64, f64); 4] = [
    (StationId::A, 7.2, 8.5),
    (StationId::B, 7.0, 8.2),
    (StationId::C, 7.5, 8.8),
    (StationId::D, 7.1, 8.3),
];

const STATUSES: [ReviewStatus; 3] = [ReviewStatus::Approved, ReviewStatus::Denied, ReviewStatus::Pending];

/// Seeded generator; the same seed always yields the same dataset.
#[derive(Debug, Clone)]
pub struct SyntheticDatasetProvider {
    pub seed: u64,
    pub observations: usize,
    pub chemistry_samples: usize,
}

impl SyntheticDatasetProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            observations: DEFAULT_OBSERVATIONS,
            chemistry_samples: DEFAULT_CHEMISTRY_SAMPLES,
        }
    }

    pub fn generate(&self) -> Dataset {
        let mut rng = Pcg64::seed_from_u64(self.seed);
        let observations = (0..self.observations)
            .map(|i| synthetic_observation(&mut rng, i))
            .collect();
        let water_chemistry = (0..self.chemistry_samples)
            .map(|_| synthetic_chemistry(&mut rng))
            .collect();
        let species = SPECIES
            .iter()
            .map(|&(name, status)| SpeciesRecord {
                name: name.to_string(),
                status,
            })
            .collect();

        Dataset {
            observations,
            water_chemistry,
            species,
        }
    }
}

impl DatasetProvider for SyntheticDatasetProvider {
    fn fetch(&self) -> Result<Dataset, FetchError> {
        Ok(self.generate())
    }

    fn describe(&self) -> String {
        format!("synthetic:seed={}", self.seed)
    }
}

fn pick<'a, T>(rng: &mut Pcg64, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn synthetic_observation(rng: &mut Pcg64, index: usize) -> Observation {
    let &(habitat, lo, hi) = pick(rng, &HABITATS);
    let noise = rng.gen_range(-5.0..5.0);
    let density = (rng.gen_range(lo..hi) + noise).max(0.0);

    let &(lat, lng) = pick(rng, &CLUSTERS);
    let half = CLUSTER_SPREAD_DEG / 2.0;
    let coordinates = Coordinates::new(lng + rng.gen_range(-half..half), lat + rng.gen_range(-half..half));

    let &(species, _) = pick(rng, &SPECIES);
    // Field status is recorded independently of the catalog, mostly invasive.
    let species_status = if rng.gen_bool(0.6) {
        SpeciesStatus::Invasive
    } else {
        SpeciesStatus::Native
    };

    Observation {
        id: Some(format!("obs_{}", index)),
        species: species.to_string(),
        species_status: Some(species_status),
        site: Some(pick(rng, &SITES).to_string()),
        habitat: Some(habitat.to_string()),
        density_per_m2: Some(round_to(density, 1)),
        depth_m: Some(rng.gen_range(0.0..10.0)),
        coordinates: Some(coordinates),
        status: *pick(rng, &STATUSES),
        source: *pick(rng, &Source::ALL),
    }
}

fn synthetic_chemistry(rng: &mut Pcg64) -> WaterChemistrySample {
    let &(station, lo, hi) = pick(rng, &STATION_PH);
    WaterChemistrySample {
        station,
        avg_ph: Some(round_to(rng.gen_range(lo..hi), 2)),
        avg_temperature: Some(round_to(rng.gen_range(16.0..28.0), 1)),
        avg_dissolved_oxygen: Some(round_to(rng.gen_range(5.0..9.0), 1)),
    }
}
