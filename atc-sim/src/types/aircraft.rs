use std::fmt;

/// Kind of aircraft an airline operates.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum AircraftType {
    Commercial,
    Cargo,
    Emergency,
}

impl AircraftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AircraftType::Commercial => "Commercial",
            AircraftType::Cargo => "Cargo",
            AircraftType::Emergency => "Emergency",
        }
    }

    /// Dispatch priority for a flight that has not declared an emergency.
    pub fn base_priority(&self) -> u8 {
        match self {
            AircraftType::Emergency => 80,
            AircraftType::Cargo => 50,
            AircraftType::Commercial => 30,
        }
    }

    /// Flight types that are routed to runway C before the direction rule.
    pub fn prefers_flexible_runway(&self) -> bool {
        matches!(self, AircraftType::Cargo | AircraftType::Emergency)
    }
}

impl fmt::Display for AircraftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of the airspace a flight enters from.
///
/// North and South are arrivals, East and West are departures.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn is_arrival(&self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }

    pub fn flight_type(&self) -> FlightType {
        match self {
            Direction::North => FlightType::InternationalArrival,
            Direction::South => FlightType::DomesticArrival,
            Direction::East => FlightType::InternationalDeparture,
            Direction::West => FlightType::DomesticDeparture,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "North",
            Direction::South => "South",
            Direction::East => "East",
            Direction::West => "West",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FlightType {
    InternationalArrival,
    DomesticArrival,
    InternationalDeparture,
    DomesticDeparture,
}

impl FlightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightType::InternationalArrival => "International Arrival",
            FlightType::DomesticArrival => "Domestic Arrival",
            FlightType::InternationalDeparture => "International Departure",
            FlightType::DomesticDeparture => "Domestic Departure",
        }
    }
}
