use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use avn_protocol::errors::ProtocolError;
use avn_protocol::messages::avn_notice::AvnNotice;
use chrono::NaiveDateTime;

use super::{
    aircraft::AircraftType, flight::Flight, flight_phase::FlightPhase, sim_error::SimError,
};

/// Surcharge applied to every base fine, in percent.
const FINE_SURCHARGE_PERCENT: u64 = 115;

/// Base fine before surcharge.
pub fn base_fine(aircraft_type: AircraftType) -> u64 {
    match aircraft_type {
        AircraftType::Commercial => 500_000,
        AircraftType::Cargo => 700_000,
        AircraftType::Emergency => 100_000,
    }
}

/// Total fine for a notice. Depends only on the aircraft type, never on speed.
pub fn fine_amount(aircraft_type: AircraftType) -> f64 {
    // Integer math keeps 700000 * 1.15 an exact 805000
    (base_fine(aircraft_type) * FINE_SURCHARGE_PERCENT / 100) as f64
}

/// `allowed_speed` of a notice raised for something other than speed.
pub const NO_SPEED_LIMIT: f64 = 0.0;

/// Rule a notice was raised under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Speed outside the phase envelope.
    Speed,
    /// Cargo arrival from the North put on a runway other than C.
    RestrictedApproach,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Speed => "speed",
            ViolationKind::RestrictedApproach => "restricted approach",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the radar saw when a flight broke a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub kind: ViolationKind,
    pub flight_id: u32,
    pub flight_number: String,
    pub airline_name: String,
    pub aircraft_type: AircraftType,
    pub phase: FlightPhase,
    pub recorded_speed: f64,
    pub allowed_speed: f64,
}

impl Breach {
    /// Speed breach against the limit `allowed_speed`.
    pub fn from_flight(flight: &Flight, allowed_speed: f64) -> Self {
        Self::new(ViolationKind::Speed, flight, allowed_speed)
    }

    pub fn restricted_approach(flight: &Flight) -> Self {
        Self::new(ViolationKind::RestrictedApproach, flight, NO_SPEED_LIMIT)
    }

    fn new(kind: ViolationKind, flight: &Flight, allowed_speed: f64) -> Self {
        Breach {
            kind,
            flight_id: flight.id,
            flight_number: flight.flight_number.clone(),
            airline_name: flight.airline.name.clone(),
            aircraft_type: flight.aircraft_type,
            phase: flight.phase(),
            recorded_speed: flight.speed(),
            allowed_speed,
        }
    }
}

/// Airspace Violation Notice.
///
/// Refers to its flight by id only; resolve it through
/// [`FlightRegistry::lookup`](super::registry::FlightRegistry::lookup).
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationNotice {
    pub id: u32,
    pub kind: ViolationKind,
    pub flight_id: u32,
    pub flight_number: String,
    pub airline_name: String,
    pub aircraft_type: AircraftType,
    pub phase: FlightPhase,
    pub recorded_speed: f64,
    pub allowed_speed: f64,
    pub fine_amount: f64,
    pub issue_time: NaiveDateTime,
    pub paid: bool,
}

impl ViolationNotice {
    /// Fixed-layout record handed to the billing stage.
    ///
    /// Fails when an id does not fit the record's signed 32-bit fields.
    pub fn to_wire(&self) -> Result<AvnNotice, ProtocolError> {
        Ok(AvnNotice {
            avn_id: wire_id(self.id, "AVN id")?,
            aircraft_id: wire_id(self.flight_id, "aircraft id")?,
            flight_number: self.flight_number.clone(),
            airline_name: self.airline_name.clone(),
            aircraft_type: self.aircraft_type.as_str().to_string(),
            recorded_speed: self.recorded_speed,
            allowed_speed: self.allowed_speed,
            total_fine: self.fine_amount,
            timestamp: self.issue_time.and_utc().timestamp(),
        })
    }
}

fn wire_id(id: u32, field: &str) -> Result<i32, ProtocolError> {
    i32::try_from(id)
        .map_err(|_| ProtocolError::SerializationError(format!("{} {} out of range", field, id)))
}

/// Every notice issued during the run, paid or not.
#[derive(Debug)]
pub struct ViolationLedger {
    notices: Mutex<Vec<ViolationNotice>>,
    next_id: AtomicU32,
}

impl Default for ViolationLedger {
    fn default() -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new notice for `breach` and returns a copy of it.
    pub fn issue(&self, breach: Breach, now: NaiveDateTime) -> Result<ViolationNotice, SimError> {
        let notice = ViolationNotice {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            kind: breach.kind,
            flight_id: breach.flight_id,
            fine_amount: fine_amount(breach.aircraft_type),
            flight_number: breach.flight_number,
            airline_name: breach.airline_name,
            aircraft_type: breach.aircraft_type,
            phase: breach.phase,
            recorded_speed: breach.recorded_speed,
            allowed_speed: breach.allowed_speed,
            issue_time: now,
            paid: false,
        };

        self.lock()?.push(notice.clone());
        Ok(notice)
    }

    /// Marks a notice as paid.
    ///
    /// Returns the notice the first time it is paid, `None` if the id is
    /// unknown or it had already been settled.
    pub fn mark_paid(&self, avn_id: u32) -> Result<Option<ViolationNotice>, SimError> {
        let mut notices = self.lock()?;
        match notices.iter_mut().find(|n| n.id == avn_id) {
            Some(notice) if !notice.paid => {
                notice.paid = true;
                Ok(Some(notice.clone()))
            }
            _ => Ok(None),
        }
    }

    /// Unpaid notices that reference `flight_id`.
    pub fn outstanding_for(&self, flight_id: u32) -> Result<usize, SimError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|n| n.flight_id == flight_id && !n.paid)
            .count())
    }

    pub fn snapshot(&self) -> Result<Vec<ViolationNotice>, SimError> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize, SimError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SimError> {
        Ok(self.lock()?.is_empty())
    }

    /// Number of notices per airline name.
    pub fn count_by_airline(&self) -> Result<BTreeMap<String, usize>, SimError> {
        let mut counts = BTreeMap::new();
        for notice in self.lock()?.iter() {
            *counts.entry(notice.airline_name.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ViolationNotice>>, SimError> {
        self.notices
            .lock()
            .map_err(|_| SimError::LockError("violation ledger".to_string()))
    }
}
