use std::fmt;
use std::sync::Mutex;

use super::flight::Flight;
use super::sim_error::SimError;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Runway {
    /// North-south strip used by arrivals.
    A,
    /// East-west strip used by departures.
    B,
    /// Flexible strip for cargo, emergencies and overflow.
    C,
}

impl Runway {
    pub const ALL: [Runway; 3] = [Runway::A, Runway::B, Runway::C];

    fn index(&self) -> usize {
        match self {
            Runway::A => 0,
            Runway::B => 1,
            Runway::C => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Runway::A => "RWY-A",
            Runway::B => "RWY-B",
            Runway::C => "RWY-C",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Runway::A => "North-South",
            Runway::B => "East-West",
            Runway::C => "Cargo/Emergency",
        }
    }
}

impl fmt::Display for Runway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of asking the arbiter for a runway.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Assignment {
    /// The runway is now held by the caller and must be released later.
    Acquired(Runway),
    /// Nothing suitable was free. Carries the direction's default runway,
    /// which was *not* acquired; the caller polls again on its next tick.
    Busy(Runway),
}

impl Assignment {
    pub fn runway(&self) -> Runway {
        match self {
            Assignment::Acquired(runway) | Assignment::Busy(runway) => *runway,
        }
    }
}

/// Exclusive owner of the three runway slots.
///
/// The arbiter does not know which flight holds which runway; the dispatcher
/// records that on the flight itself. When the flight lock is held too, it
/// must be taken before this one.
#[derive(Debug, Default)]
pub struct RunwayArbiter {
    occupied: Mutex<[bool; 3]>,
}

impl RunwayArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks and acquires a runway for `flight`.
    ///
    /// Cargo and emergency-type aircraft try runway C first, then everyone
    /// falls through to the direction rule: arrivals use A, departures use B.
    pub fn assign(&self, flight: &Flight) -> Result<Assignment, SimError> {
        let mut occupied = self.lock()?;

        if flight.aircraft_type.prefers_flexible_runway() && !occupied[Runway::C.index()] {
            occupied[Runway::C.index()] = true;
            return Ok(Assignment::Acquired(Runway::C));
        }

        let default = if flight.direction.is_arrival() {
            Runway::A
        } else {
            Runway::B
        };

        if !occupied[default.index()] {
            occupied[default.index()] = true;
            return Ok(Assignment::Acquired(default));
        }

        Ok(Assignment::Busy(default))
    }

    /// Acquires `runway` if it is free. Returns whether it was acquired.
    pub fn acquire(&self, runway: Runway) -> Result<bool, SimError> {
        let mut occupied = self.lock()?;
        if occupied[runway.index()] {
            return Ok(false);
        }
        occupied[runway.index()] = true;
        Ok(true)
    }

    /// Unconditionally marks `runway` as free.
    pub fn release(&self, runway: Runway) -> Result<(), SimError> {
        let mut occupied = self.lock()?;
        occupied[runway.index()] = false;
        Ok(())
    }

    pub fn is_available(&self, runway: Runway) -> Result<bool, SimError> {
        Ok(!self.lock()?[runway.index()])
    }

    /// Copy of the slots, `true` meaning occupied, indexed A, B, C.
    pub fn status(&self) -> Result<[bool; 3], SimError> {
        Ok(*self.lock()?)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, [bool; 3]>, SimError> {
        self.occupied
            .lock()
            .map_err(|_| SimError::LockError("runway slots".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::flight;
    use crate::types::aircraft::{AircraftType, Direction};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_arrival_gets_runway_a() {
        let arbiter = RunwayArbiter::new();

        let assignment = arbiter
            .assign(&flight(1, AircraftType::Commercial, Direction::North))
            .unwrap();

        assert_eq!(assignment, Assignment::Acquired(Runway::A));
        assert!(!arbiter.is_available(Runway::A).unwrap());
    }

    #[test]
    fn test_departure_gets_runway_b() {
        let arbiter = RunwayArbiter::new();

        let assignment = arbiter
            .assign(&flight(1, AircraftType::Commercial, Direction::West))
            .unwrap();

        assert_eq!(assignment, Assignment::Acquired(Runway::B));
    }

    #[test]
    fn test_cargo_and_emergency_prefer_c() {
        let arbiter = RunwayArbiter::new();

        let cargo = arbiter
            .assign(&flight(1, AircraftType::Cargo, Direction::South))
            .unwrap();
        assert_eq!(cargo, Assignment::Acquired(Runway::C));

        // C is taken now, the emergency aircraft falls through to its direction
        let medevac = arbiter
            .assign(&flight(2, AircraftType::Emergency, Direction::East))
            .unwrap();
        assert_eq!(medevac, Assignment::Acquired(Runway::B));
    }

    #[test]
    fn test_departures_are_never_put_on_runway_a() {
        for aircraft_type in [
            AircraftType::Commercial,
            AircraftType::Cargo,
            AircraftType::Emergency,
        ] {
            for direction in [Direction::East, Direction::West] {
                for busy in 0u8..8 {
                    let arbiter = RunwayArbiter::new();
                    for (bit, runway) in Runway::ALL.iter().enumerate() {
                        if busy & (1 << bit) != 0 {
                            arbiter.acquire(*runway).unwrap();
                        }
                    }

                    let assignment = arbiter
                        .assign(&flight(1, aircraft_type, direction))
                        .unwrap();

                    assert_ne!(assignment.runway(), Runway::A);
                }
            }
        }
    }

    #[test]
    fn test_busy_returns_default_without_acquiring() {
        let arbiter = RunwayArbiter::new();
        assert!(arbiter.acquire(Runway::A).unwrap());

        let assignment = arbiter
            .assign(&flight(1, AircraftType::Commercial, Direction::South))
            .unwrap();

        assert_eq!(assignment, Assignment::Busy(Runway::A));
        assert_eq!(arbiter.status().unwrap(), [true, false, false]);
    }

    #[test]
    fn test_release_is_unconditional() {
        let arbiter = RunwayArbiter::new();

        arbiter.release(Runway::B).unwrap();
        assert!(arbiter.is_available(Runway::B).unwrap());

        assert!(arbiter.acquire(Runway::B).unwrap());
        assert!(!arbiter.acquire(Runway::B).unwrap());
        arbiter.release(Runway::B).unwrap();
        assert!(arbiter.is_available(Runway::B).unwrap());
    }

    #[test]
    fn test_concurrent_assign_never_double_books() {
        let arbiter = Arc::new(RunwayArbiter::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let arbiter = Arc::clone(&arbiter);
                thread::spawn(move || {
                    arbiter
                        .assign(&flight(i, AircraftType::Commercial, Direction::North))
                        .unwrap()
                })
            })
            .collect();

        let acquired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| matches!(a, Assignment::Acquired(_)))
            .count();

        assert_eq!(acquired, 1);
    }
}
