/// Station registry for the Sea of Galilee water chemistry network.
///
/// Defines the canonical list of monitoring stations and the latitude /
/// longitude band each one covers. This is the single source of truth for
/// mapping an observation's position onto a station. The regression engine
/// uses it to join chemistry samples onto snail observations, and the audit
/// uses it to report how many observations fall outside every band.

use crate::model::{Coordinates, StationId};

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// A rectangular latitude/longitude band assigned to one station.
/// Bounds are inclusive on all four edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationBand {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl StationBand {
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// Metadata for a single chemistry monitoring station.
pub struct Station {
    pub id: StationId,
    /// Human-readable description of the area the station samples.
    pub description: &'static str,
    /// Area whose observations are joined to this station's chemistry.
    /// Stations without a band only receive observations through the
    /// fallback in [`coordinates_to_station`].
    pub band: Option<StationBand>,
}

/// All chemistry stations, in lookup order. When bands touch, the earlier
/// entry wins, so ordering is part of the mapping.
pub static STATION_REGISTRY: &[Station] = &[
    Station {
        id: StationId::A,
        description: "South-western shore between Tiberias and the Jordan outflow. \
                      Also the fallback station for positions outside every band.",
        band: Some(StationBand {
            min_lat: 32.7,
            max_lat: 32.8,
            min_lng: 35.5,
            max_lng: 35.6,
        }),
    },
    Station {
        id: StationId::B,
        description: "Central western basin off Ginosar.",
        band: Some(StationBand {
            min_lat: 32.8,
            max_lat: 32.9,
            min_lng: 35.6,
            max_lng: 35.7,
        }),
    },
    Station {
        id: StationId::C,
        description: "North-eastern inflow area near the Jordan Park delta.",
        band: Some(StationBand {
            min_lat: 32.9,
            max_lat: 33.0,
            min_lng: 35.7,
            max_lng: 35.8,
        }),
    },
    Station {
        id: StationId::D,
        description: "Upper Jordan reach north of the lake.",
        band: Some(StationBand {
            min_lat: 33.0,
            max_lat: 33.1,
            min_lng: 35.6,
            max_lng: 35.7,
        }),
    },
    Station {
        id: StationId::E,
        description: "Deep-water profiling station. Reports chemistry but has no \
                      shoreline band of its own.",
        band: None,
    },
];

/// Station used when a position matches no band.
pub const DEFAULT_STATION: StationId = StationId::A;

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Maps a position onto a station identifier.
///
/// Total and deterministic: the first band (in registry order) containing
/// the point wins, and points outside every band map to
/// [`DEFAULT_STATION`]. Non-finite inputs never match a band.
pub fn coordinates_to_station(lng: f64, lat: f64) -> StationId {
    band_station(lng, lat).unwrap_or(DEFAULT_STATION)
}

/// Like [`coordinates_to_station`] but reports whether a band actually
/// matched, so callers can tell a real assignment from the fallback.
pub fn band_station(lng: f64, lat: f64) -> Option<StationId> {
    STATION_REGISTRY
        .iter()
        .find(|s| s.band.is_some_and(|b| b.contains(lng, lat)))
        .map(|s| s.id)
}

/// Convenience wrapper taking a [`Coordinates`] value.
pub fn station_for(coords: &Coordinates) -> StationId {
    coordinates_to_station(coords.lng, coords.lat)
}

/// Looks up a station by identifier. Returns `None` only if the registry
/// is missing an entry, which the tests below guard against.
pub fn find_station(id: StationId) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.id == id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
