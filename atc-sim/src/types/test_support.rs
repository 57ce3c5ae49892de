//! Builders shared by the unit tests of this crate.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use super::{
    aircraft::{AircraftType, Direction},
    airline::Airline,
    flight::Flight,
    flight_phase::FlightPhase,
};

/// Simulated instant `secs` seconds after a fixed start of day.
pub(crate) fn at(secs: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .map(|t| t + chrono::Duration::seconds(secs))
        .unwrap()
}

/// First roster airline flying `aircraft_type`.
pub(crate) fn airline(aircraft_type: AircraftType) -> Arc<Airline> {
    Airline::roster()
        .into_iter()
        .find(|a| a.aircraft_type == aircraft_type)
        .unwrap()
}

/// Non-emergency flight in its entry phase, scheduled at `at(0)`, flying at the
/// middle of its entry band.
pub(crate) fn flight(id: u32, aircraft_type: AircraftType, direction: Direction) -> Flight {
    let (low, high) = FlightPhase::entry(direction).sampling_band();
    let airline = airline(aircraft_type);
    Flight::new(
        id,
        &format!("{}-{}", airline.name, 100 + id),
        airline,
        direction,
        false,
        (low + high) / 2.0,
        at(0),
    )
}
