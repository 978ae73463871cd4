//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers (geocoding and current readings)
//! - The local SQLite store for cached coordinates and observations
//! - The polling cycle that ties the two together
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod provider;
pub mod store;

pub use config::{Config, PollConfig, ProviderConfig};
pub use error::StoreError;
pub use ingest::{CycleReport, Pacing, run_cycle};
pub use model::{Coordinates, Observation, RawObservation};
pub use provider::{ProviderId, WeatherProvider};
pub use store::{CityStore, InsertOutcome, ObservationStore, TimeBound, WeatherDatabase};
