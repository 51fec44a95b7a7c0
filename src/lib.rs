//! Synthetic song-play traffic: reference data, event generation, paced
//! delivery to an ingestion endpoint, and the ingestion boundary that hands
//! events to a durable log.

pub mod config;
pub mod delivery;
pub mod factory;
pub mod generator;
pub mod logging;
pub mod master;
pub mod metrics;
pub mod model;
pub mod output;
pub mod rate;
pub mod roles;
pub mod transport;
pub mod wire;
