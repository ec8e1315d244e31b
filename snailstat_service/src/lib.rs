//! Snail-observation analytics service.
//!
//! Fetches a snapshot of field observations, water chemistry and the species
//! catalog from a data store, and answers statistical queries over it: depth
//! t-tests, group means, density~pH regression, species-status contingency
//! and kriging-style density maps. Results and snapshots are cached on an
//! injectable clock.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod service;
pub mod stations;
pub mod verify;
