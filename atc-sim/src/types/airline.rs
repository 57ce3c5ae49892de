use std::sync::Arc;

use super::aircraft::AircraftType;

/// Represents an airline operating at the airport.

#[derive(Clone, Debug, PartialEq)]
pub struct Airline {
    pub name: String,
    pub aircraft_type: AircraftType,
    pub total_aircraft: u32,
    pub flights_in_operation: u32,
}

impl Airline {
    pub fn new(
        name: &str,
        aircraft_type: AircraftType,
        total_aircraft: u32,
        flights_in_operation: u32,
    ) -> Self {
        Airline {
            name: name.to_string(),
            aircraft_type,
            total_aircraft,
            flights_in_operation,
        }
    }

    /// Airlines operating at the airport when the simulation starts.
    pub fn roster() -> Vec<Arc<Airline>> {
        vec![
            Arc::new(Airline::new("PIA", AircraftType::Commercial, 6, 4)),
            Arc::new(Airline::new("AirBlue", AircraftType::Commercial, 4, 4)),
            Arc::new(Airline::new("FedEx", AircraftType::Cargo, 3, 2)),
            Arc::new(Airline::new("Pakistan Airforce", AircraftType::Emergency, 2, 1)),
            Arc::new(Airline::new("Blue Dart", AircraftType::Cargo, 2, 2)),
            Arc::new(Airline::new("AghaKhan Air Ambulance", AircraftType::Emergency, 2, 1)),
        ]
    }
}
