use std::sync::Arc;

use chrono::NaiveDateTime;
use rand::Rng;

use super::{
    aircraft::{AircraftType, Direction, FlightType},
    airline::Airline,
    flight_phase::FlightPhase,
    runway::Runway,
    sim_error::SimError,
};

/// Priority for a flight. The only place priority is ever computed.
pub fn compute_priority(is_emergency: bool, aircraft_type: AircraftType) -> u8 {
    if is_emergency {
        100
    } else {
        aircraft_type.base_priority()
    }
}

/// Draws the speed a flight takes when it enters a phase.
#[derive(Debug, Clone, Copy)]
pub struct SpeedModel {
    /// Chance that a transition overshoots the phase's upper limit.
    pub overshoot_probability: f64,
}

impl SpeedModel {
    pub fn new(overshoot_probability: f64) -> Self {
        Self {
            overshoot_probability: overshoot_probability.clamp(0.0, 1.0),
        }
    }

    /// A model that always stays inside the legal band.
    pub fn compliant() -> Self {
        Self::new(0.0)
    }

    pub fn sample<R: Rng>(&self, phase: FlightPhase, rng: &mut R) -> f64 {
        if self.overshoot_probability > 0.0 && rng.gen_bool(self.overshoot_probability) {
            let limit = phase.envelope().max;
            return limit * rng.gen_range(1.05..=1.25);
        }
        let (low, high) = phase.sampling_band();
        rng.gen_range(low..=high)
    }
}

/// A live flight tracked by the control tower.
///
/// Identity fields are public. Everything the state machine, the generator or
/// the radar owns goes through methods so the invariants hold.
#[derive(Debug, Clone)]
pub struct Flight {
    pub id: u32,
    pub flight_number: String,
    pub airline: Arc<Airline>,
    pub direction: Direction,
    pub aircraft_type: AircraftType,
    pub schedule_time: NaiveDateTime,
    phase: FlightPhase,
    phase_entered_at: NaiveDateTime,
    runway: Option<Runway>,
    speed: f64,
    priority: u8,
    is_emergency: bool,
    has_active_violation: bool,
    violations_raised: u32,
}

impl Flight {
    /// Creates a flight in the entry phase for its direction.
    pub fn new(
        id: u32,
        flight_number: &str,
        airline: Arc<Airline>,
        direction: Direction,
        is_emergency: bool,
        speed: f64,
        now: NaiveDateTime,
    ) -> Self {
        let aircraft_type = airline.aircraft_type;
        Flight {
            id,
            flight_number: flight_number.to_string(),
            airline,
            direction,
            aircraft_type,
            schedule_time: now,
            phase: FlightPhase::entry(direction),
            phase_entered_at: now,
            runway: None,
            speed,
            priority: compute_priority(is_emergency, aircraft_type),
            is_emergency,
            has_active_violation: false,
            violations_raised: 0,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn phase_entered_at(&self) -> NaiveDateTime {
        self.phase_entered_at
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn runway(&self) -> Option<Runway> {
        self.runway
    }

    pub fn is_emergency(&self) -> bool {
        self.is_emergency
    }

    pub fn has_active_violation(&self) -> bool {
        self.has_active_violation
    }

    /// Violation episodes opened over the flight's life.
    pub fn violations_raised(&self) -> u32 {
        self.violations_raised
    }

    pub fn flight_type(&self) -> FlightType {
        self.direction.flight_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal_for(self.direction)
    }

    /// Moves exactly one phase forward and draws a new speed for it.
    pub fn advance<R: Rng>(
        &mut self,
        speeds: &SpeedModel,
        rng: &mut R,
        now: NaiveDateTime,
    ) -> Result<FlightPhase, SimError> {
        let next = self
            .phase
            .successor(self.direction)
            .ok_or(SimError::InvalidStateTransition {
                flight_id: self.id,
                from: self.phase,
            })?;

        self.phase = next;
        self.phase_entered_at = now;
        self.speed = speeds.sample(next, rng);

        Ok(next)
    }

    pub(crate) fn hold_runway(&mut self, runway: Runway) {
        self.runway = Some(runway);
    }

    pub(crate) fn take_runway(&mut self) -> Option<Runway> {
        self.runway.take()
    }

    /// Flags the flight as an emergency. Never reverts.
    ///
    /// Returns `false` if it already was one.
    pub fn declare_emergency(&mut self) -> bool {
        if self.is_emergency {
            return false;
        }
        self.is_emergency = true;
        self.priority = compute_priority(self.is_emergency, self.aircraft_type);
        true
    }

    /// Opens a violation episode. Returns `false` if one is already open.
    pub(crate) fn flag_violation(&mut self) -> bool {
        if self.has_active_violation {
            return false;
        }
        self.has_active_violation = true;
        self.violations_raised += 1;
        true
    }

    pub(crate) fn clear_violation(&mut self) {
        self.has_active_violation = false;
    }

    #[cfg(test)]
    pub(crate) fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::{at, flight};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_flight_starts_in_entry_phase() {
        let arrival = flight(1, AircraftType::Commercial, Direction::North);
        let departure = flight(2, AircraftType::Cargo, Direction::West);

        assert_eq!(arrival.phase(), FlightPhase::Holding);
        assert_eq!(departure.phase(), FlightPhase::Taxi);
        assert_eq!(arrival.priority(), 30);
        assert_eq!(departure.priority(), 50);
        assert_eq!(arrival.flight_type(), FlightType::InternationalArrival);
    }

    #[test]
    fn test_advance_moves_one_phase_and_resamples_speed() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut f = flight(1, AircraftType::Commercial, Direction::South);

        let next = f.advance(&SpeedModel::compliant(), &mut rng, at(60)).unwrap();

        assert_eq!(next, FlightPhase::Approach);
        assert_eq!(f.phase_entered_at(), at(60));
        assert!((240.0..=290.0).contains(&f.speed()));
    }

    #[test]
    fn test_advance_from_terminal_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut f = flight(9, AircraftType::Commercial, Direction::East);
        for _ in 0..3 {
            f.advance(&SpeedModel::compliant(), &mut rng, at(0)).unwrap();
        }
        assert_eq!(f.phase(), FlightPhase::Departure);

        let err = f
            .advance(&SpeedModel::compliant(), &mut rng, at(0))
            .unwrap_err();

        assert!(matches!(
            err,
            SimError::InvalidStateTransition {
                flight_id: 9,
                from: FlightPhase::Departure
            }
        ));
        assert_eq!(f.phase(), FlightPhase::Departure);
    }

    #[test]
    fn test_declare_emergency_only_touches_priority() {
        let mut f = flight(1, AircraftType::Commercial, Direction::North);
        f.set_speed(512.0);

        assert!(f.declare_emergency());

        assert_eq!(f.priority(), 100);
        assert_eq!(f.phase(), FlightPhase::Holding);
        assert_eq!(f.speed(), 512.0);
        assert!(!f.declare_emergency());
        assert!(f.is_emergency());
    }

    #[test]
    fn test_priority_is_a_function_of_emergency_and_type() {
        assert_eq!(compute_priority(true, AircraftType::Commercial), 100);
        assert_eq!(compute_priority(true, AircraftType::Cargo), 100);
        assert_eq!(compute_priority(false, AircraftType::Emergency), 80);
        assert_eq!(compute_priority(false, AircraftType::Cargo), 50);
        assert_eq!(compute_priority(false, AircraftType::Commercial), 30);
    }

    #[test]
    fn test_violation_flag_is_single_episode() {
        let mut f = flight(1, AircraftType::Cargo, Direction::North);

        assert!(f.flag_violation());
        assert!(!f.flag_violation());
        f.clear_violation();
        assert!(f.flag_violation());
        assert_eq!(f.violations_raised(), 2);
    }

    #[test]
    fn test_overshoot_model_breaks_the_envelope() {
        let mut rng = StdRng::seed_from_u64(3);
        let always = SpeedModel::new(1.0);

        for phase in FlightPhase::ORDER {
            let speed = always.sample(phase, &mut rng);
            assert_eq!(phase.envelope().breached_limit(speed), Some(phase.envelope().max));
        }
    }

    #[test]
    fn test_overshoot_probability_is_clamped() {
        assert_eq!(SpeedModel::new(3.0).overshoot_probability, 1.0);
        assert_eq!(SpeedModel::new(-1.0).overshoot_probability, 0.0);
    }
}
