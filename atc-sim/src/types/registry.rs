use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime};

use super::{
    aircraft::{AircraftType, Direction},
    flight::Flight,
    flight_phase::FlightPhase,
    sim_error::SimError,
};

/// Outcome of resolving a flight id.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Flight),
    /// The flight was never registered or has already been retired.
    NotFound,
}

impl Lookup {
    pub fn found(self) -> Option<Flight> {
        match self {
            Lookup::Found(flight) => Some(flight),
            Lookup::NotFound => None,
        }
    }
}

/// What is left of a flight once it has been retired.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    pub id: u32,
    pub flight_number: String,
    pub airline_name: String,
    pub aircraft_type: AircraftType,
    pub direction: Direction,
    pub final_phase: FlightPhase,
    pub schedule_time: NaiveDateTime,
    pub retired_at: NaiveDateTime,
    pub raised_violation: bool,
}

impl FlightRecord {
    fn from_flight(flight: &Flight, retired_at: NaiveDateTime) -> Self {
        FlightRecord {
            id: flight.id,
            flight_number: flight.flight_number.clone(),
            airline_name: flight.airline.name.clone(),
            aircraft_type: flight.aircraft_type,
            direction: flight.direction,
            final_phase: flight.phase(),
            schedule_time: flight.schedule_time,
            retired_at,
            raised_violation: flight.violations_raised() > 0,
        }
    }
}

/// Owner of every live flight.
///
/// All live flights sit behind a single lock. Code that also needs the runway
/// arbiter takes this lock first.
#[derive(Debug)]
pub struct FlightRegistry {
    flights: Mutex<Vec<Flight>>,
    history: Mutex<Vec<FlightRecord>>,
    next_id: AtomicU32,
}

impl Default for FlightRegistry {
    fn default() -> Self {
        Self {
            flights: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an already built flight. Ids handed out by [`spawn`](Self::spawn)
    /// afterwards are always greater than its id.
    pub fn add(&self, flight: Flight) -> Result<u32, SimError> {
        let id = flight.id;
        self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        self.lock_flights()?.push(flight);
        Ok(id)
    }

    /// Allocates a fresh id, builds the flight with it and inserts it.
    pub fn spawn(&self, build: impl FnOnce(u32) -> Flight) -> Result<u32, SimError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock_flights()?.push(build(id));
        Ok(id)
    }

    pub fn lookup(&self, id: u32) -> Result<Lookup, SimError> {
        Ok(self
            .lock_flights()?
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .map_or(Lookup::NotFound, Lookup::Found))
    }

    /// Copies of every live flight, in insertion order.
    pub fn snapshot(&self) -> Result<Vec<Flight>, SimError> {
        Ok(self.lock_flights()?.clone())
    }

    pub fn len(&self) -> Result<usize, SimError> {
        Ok(self.lock_flights()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SimError> {
        Ok(self.lock_flights()?.is_empty())
    }

    /// Runs `f` with the flight lock held.
    pub fn with_flights<T>(&self, f: impl FnOnce(&mut Vec<Flight>) -> T) -> Result<T, SimError> {
        let mut flights = self.lock_flights()?;
        Ok(f(&mut flights))
    }

    /// Moves terminal flights whose grace period has run out into the history.
    pub fn retire_expired(
        &self,
        now: NaiveDateTime,
        grace: Duration,
    ) -> Result<Vec<FlightRecord>, SimError> {
        let mut flights = self.lock_flights()?;
        let mut retired = Vec::new();
        flights.retain(|flight| {
            let expired = flight.is_terminal() && now - flight.phase_entered_at() >= grace;
            if expired {
                retired.push(FlightRecord::from_flight(flight, now));
            }
            !expired
        });
        drop(flights);

        if !retired.is_empty() {
            self.lock_history()?.extend(retired.iter().cloned());
        }
        Ok(retired)
    }

    pub fn history(&self) -> Result<Vec<FlightRecord>, SimError> {
        Ok(self.lock_history()?.clone())
    }

    /// Flights retired so far.
    pub fn total_processed(&self) -> Result<usize, SimError> {
        Ok(self.lock_history()?.len())
    }

    /// Closes the violation episode of `id`. Returns `false` if the flight is
    /// gone or had no open episode.
    pub fn clear_violation(&self, id: u32) -> Result<bool, SimError> {
        let mut flights = self.lock_flights()?;
        match flights.iter_mut().find(|f| f.id == id) {
            Some(flight) if flight.has_active_violation() => {
                flight.clear_violation();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Escalates `id` to emergency status.
    pub fn declare_emergency(&self, id: u32) -> Result<bool, SimError> {
        self.lock_flights()?
            .iter_mut()
            .find(|f| f.id == id)
            .map(|flight| flight.declare_emergency())
            .ok_or(SimError::FlightNotFound(id))
    }

    fn lock_flights(&self) -> Result<MutexGuard<'_, Vec<Flight>>, SimError> {
        self.flights
            .lock()
            .map_err(|_| SimError::LockError("flight registry".to_string()))
    }

    fn lock_history(&self) -> Result<MutexGuard<'_, Vec<FlightRecord>>, SimError> {
        self.history
            .lock()
            .map_err(|_| SimError::LockError("flight history".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::flight::SpeedModel;
    use crate::types::test_support::{at, flight};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_allocates_monotonic_ids_after_add() {
        let registry = FlightRegistry::new();
        registry
            .add(flight(7, AircraftType::Commercial, Direction::North))
            .unwrap();

        let id = registry
            .spawn(|id| flight(id, AircraftType::Cargo, Direction::East))
            .unwrap();

        assert_eq!(id, 8);
        assert_eq!(registry.len().unwrap(), 2);
    }

    #[test]
    fn test_lookup_unknown_id_is_not_found() {
        let registry = FlightRegistry::new();
        registry
            .add(flight(1, AircraftType::Commercial, Direction::North))
            .unwrap();

        assert!(registry.lookup(1).unwrap().found().is_some());
        assert!(matches!(registry.lookup(2).unwrap(), Lookup::NotFound));
    }

    #[test]
    fn test_retire_waits_for_grace_period() {
        let mut rng = StdRng::seed_from_u64(5);
        let registry = FlightRegistry::new();
        let mut f = flight(3, AircraftType::Commercial, Direction::West);
        for step in 1..=3 {
            f.advance(&SpeedModel::compliant(), &mut rng, at(step * 60))
                .unwrap();
        }
        assert!(f.is_terminal());
        registry.add(f).unwrap();
        registry
            .add(flight(4, AircraftType::Commercial, Direction::North))
            .unwrap();

        let early = registry.retire_expired(at(180 + 599), Duration::seconds(600)).unwrap();
        assert!(early.is_empty());

        let retired = registry.retire_expired(at(180 + 600), Duration::seconds(600)).unwrap();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].final_phase, FlightPhase::Departure);
        assert_eq!(retired[0].retired_at, at(780));

        assert!(matches!(registry.lookup(3).unwrap(), Lookup::NotFound));
        assert_eq!(registry.len().unwrap(), 1);
        assert_eq!(registry.total_processed().unwrap(), 1);
        assert_eq!(registry.history().unwrap()[0].id, 3);
    }

    #[test]
    fn test_clear_violation_only_on_open_episode() {
        let registry = FlightRegistry::new();
        let mut f = flight(1, AircraftType::Cargo, Direction::South);
        f.flag_violation();
        registry.add(f).unwrap();

        assert!(registry.clear_violation(1).unwrap());
        assert!(!registry.clear_violation(1).unwrap());
        assert!(!registry.clear_violation(99).unwrap());
    }

    #[test]
    fn test_declare_emergency_through_registry() {
        let registry = FlightRegistry::new();
        registry
            .add(flight(1, AircraftType::Commercial, Direction::South))
            .unwrap();

        assert!(registry.declare_emergency(1).unwrap());
        assert!(!registry.declare_emergency(1).unwrap());
        assert!(matches!(
            registry.declare_emergency(2),
            Err(SimError::FlightNotFound(2))
        ));
        assert_eq!(registry.lookup(1).unwrap().found().unwrap().priority(), 100);
    }
}
