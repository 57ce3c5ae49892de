use std::fmt;

use super::aircraft::Direction;

/// Lifecycle phases of a flight, in their fixed order.
///
/// Arrivals run `Holding → Approach → Landing → Taxi → AtGate`.
/// Departures push back into `Taxi` and run `Taxi → TakeoffRoll → Climb → Departure`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum FlightPhase {
    Holding,
    Approach,
    Landing,
    Taxi,
    AtGate,
    TakeoffRoll,
    Climb,
    Departure,
}

/// Legal speed range for a phase, in km/h. Both ends are inclusive.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SpeedEnvelope {
    pub min: f64,
    pub max: f64,
}

impl SpeedEnvelope {
    /// Returns the limit `speed` breaks, if any.
    pub fn breached_limit(&self, speed: f64) -> Option<f64> {
        if speed > self.max {
            Some(self.max)
        } else if speed < self.min {
            Some(self.min)
        } else {
            None
        }
    }
}

impl FlightPhase {
    pub const ORDER: [FlightPhase; 8] = [
        FlightPhase::Holding,
        FlightPhase::Approach,
        FlightPhase::Landing,
        FlightPhase::Taxi,
        FlightPhase::AtGate,
        FlightPhase::TakeoffRoll,
        FlightPhase::Climb,
        FlightPhase::Departure,
    ];

    /// Converts the `FlightPhase` variant to its corresponding string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::Holding => "Holding",
            FlightPhase::Approach => "Approach",
            FlightPhase::Landing => "Landing",
            FlightPhase::Taxi => "Taxi",
            FlightPhase::AtGate => "At Gate",
            FlightPhase::TakeoffRoll => "Takeoff Roll",
            FlightPhase::Climb => "Climb",
            FlightPhase::Departure => "Departure",
        }
    }

    /// Phase a newly created flight starts in.
    pub fn entry(direction: Direction) -> FlightPhase {
        if direction.is_arrival() {
            FlightPhase::Holding
        } else {
            FlightPhase::Taxi
        }
    }

    /// Next phase on the branch chosen by `direction`, `None` once terminal.
    pub fn successor(&self, direction: Direction) -> Option<FlightPhase> {
        let arrival = direction.is_arrival();
        match self {
            FlightPhase::Holding if arrival => Some(FlightPhase::Approach),
            FlightPhase::Approach if arrival => Some(FlightPhase::Landing),
            FlightPhase::Landing if arrival => Some(FlightPhase::Taxi),
            FlightPhase::Taxi if arrival => Some(FlightPhase::AtGate),
            FlightPhase::Taxi => Some(FlightPhase::TakeoffRoll),
            FlightPhase::TakeoffRoll if !arrival => Some(FlightPhase::Climb),
            FlightPhase::Climb if !arrival => Some(FlightPhase::Departure),
            _ => None,
        }
    }

    pub fn is_terminal_for(&self, direction: Direction) -> bool {
        if direction.is_arrival() {
            *self == FlightPhase::AtGate
        } else {
            *self == FlightPhase::Departure
        }
    }

    /// Leaving this phase needs a runway: final approach for arrivals, the
    /// line-up from taxi for departures.
    pub fn requires_runway(&self, direction: Direction) -> bool {
        if direction.is_arrival() {
            *self == FlightPhase::Approach
        } else {
            *self == FlightPhase::Taxi
        }
    }

    /// Entering this phase frees the runway the flight was holding.
    pub fn releases_runway(&self, direction: Direction) -> bool {
        if direction.is_arrival() {
            *self == FlightPhase::Taxi
        } else {
            *self == FlightPhase::Climb
        }
    }

    pub fn envelope(&self) -> SpeedEnvelope {
        let (min, max) = match self {
            FlightPhase::Holding => (0.0, 600.0),
            FlightPhase::Approach => (240.0, 290.0),
            FlightPhase::Landing => (30.0, 240.0),
            FlightPhase::Taxi => (0.0, 30.0),
            FlightPhase::AtGate => (0.0, 10.0),
            FlightPhase::TakeoffRoll => (0.0, 290.0),
            FlightPhase::Climb => (0.0, 463.0),
            FlightPhase::Departure => (800.0, 900.0),
        };
        SpeedEnvelope { min, max }
    }

    /// Range speeds are drawn from when a flight enters this phase.
    /// Always inside `envelope()`.
    pub fn sampling_band(&self) -> (f64, f64) {
        match self {
            FlightPhase::Holding => (400.0, 600.0),
            FlightPhase::Approach => (240.0, 290.0),
            FlightPhase::Landing => (30.0, 240.0),
            FlightPhase::Taxi => (15.0, 30.0),
            FlightPhase::AtGate => (0.0, 5.0),
            FlightPhase::TakeoffRoll => (120.0, 290.0),
            FlightPhase::Climb => (250.0, 463.0),
            FlightPhase::Departure => (800.0, 900.0),
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
