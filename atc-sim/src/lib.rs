//! AirControlX control tower core.
//!
//! Flights move through a fixed lifecycle under a priority dispatcher that
//! arbitrates three runways, while a radar issues Airspace Violation Notices
//! to the billing pipeline.

pub mod config;
pub mod types;

pub use config::{ConfigError, SimConfig};
pub use types::sim_error::SimError;
pub use types::simulation::{FinalStats, Simulation, StatusSnapshot};
