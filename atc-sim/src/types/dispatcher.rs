use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use logger::{Color, Logger};
use rand::Rng;

use super::{
    flight::{Flight, SpeedModel},
    flight_phase::FlightPhase,
    registry::{FlightRecord, FlightRegistry},
    runway::{Assignment, Runway, RunwayArbiter},
    sim_error::SimError,
};

/// One phase change made during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub flight_id: u32,
    pub from: FlightPhase,
    pub to: FlightPhase,
    /// Runway acquired to make this transition.
    pub acquired: Option<Runway>,
    /// Runway given back after this transition.
    pub released: Option<Runway>,
}

/// Everything a dispatcher tick did, in processing order.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Flight ids in the order they were processed.
    pub order: Vec<u32>,
    pub transitions: Vec<Transition>,
    /// Flights held in place because their runway was busy.
    pub waiting: Vec<(u32, Runway)>,
    /// Flights the state machine refused to move.
    pub rejected: Vec<(u32, FlightPhase)>,
    pub retired: Vec<FlightRecord>,
}

impl DispatchReport {
    pub fn transition_of(&self, flight_id: u32) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.flight_id == flight_id)
    }

    pub fn is_waiting(&self, flight_id: u32) -> bool {
        self.waiting.iter().any(|(id, _)| *id == flight_id)
    }
}

/// Indices of `flights` in dispatch order: priority descending, then earlier
/// schedule time, then lower id.
pub fn dispatch_order(flights: &[Flight]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..flights.len()).collect();
    order.sort_by_key(|&i| {
        let f = &flights[i];
        (Reverse(f.priority()), f.schedule_time, f.id)
    });
    order
}

/// Moves every live flight one step along its lifecycle per tick, gating
/// runway phases on the arbiter.
pub struct Dispatcher {
    registry: Arc<FlightRegistry>,
    runways: Arc<RunwayArbiter>,
    speeds: SpeedModel,
    retire_grace: Duration,
    logger: Logger,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<FlightRegistry>,
        runways: Arc<RunwayArbiter>,
        speeds: SpeedModel,
        retire_grace: Duration,
        logger: Logger,
    ) -> Self {
        Dispatcher {
            registry,
            runways,
            speeds,
            retire_grace,
            logger,
        }
    }

    /// Runs one dispatch pass at simulated time `now`.
    pub fn tick<R: Rng>(&self, now: NaiveDateTime, rng: &mut R) -> Result<DispatchReport, SimError> {
        let mut report = self
            .registry
            .with_flights(|flights| self.advance_all(flights, now, rng))??;

        report.retired = self.registry.retire_expired(now, self.retire_grace)?;

        self.log_report(&report);
        Ok(report)
    }

    fn advance_all<R: Rng>(
        &self,
        flights: &mut [Flight],
        now: NaiveDateTime,
        rng: &mut R,
    ) -> Result<DispatchReport, SimError> {
        let mut report = DispatchReport::default();

        for index in dispatch_order(flights) {
            let flight = &mut flights[index];
            report.order.push(flight.id);

            if flight.is_terminal() {
                continue;
            }

            let from = flight.phase();
            let mut acquired = None;

            if from.requires_runway(flight.direction) {
                match self.runways.assign(flight)? {
                    Assignment::Acquired(runway) => acquired = Some(runway),
                    Assignment::Busy(runway) => {
                        report.waiting.push((flight.id, runway));
                        continue;
                    }
                }
            }

            let to = match flight.advance(&self.speeds, rng, now) {
                Ok(to) => to,
                Err(_) => {
                    if let Some(runway) = acquired {
                        self.runways.release(runway)?;
                    }
                    report.rejected.push((flight.id, from));
                    continue;
                }
            };

            if let Some(runway) = acquired {
                flight.hold_runway(runway);
            }

            let mut released = None;
            if to.releases_runway(flight.direction) {
                if let Some(runway) = flight.take_runway() {
                    self.runways.release(runway)?;
                    released = Some(runway);
                }
            }

            report.transitions.push(Transition {
                flight_id: flight.id,
                from,
                to,
                acquired,
                released,
            });
        }

        Ok(report)
    }

    // Runs after every lock is released
    fn log_report(&self, report: &DispatchReport) {
        for t in &report.transitions {
            if let Some(runway) = t.acquired {
                let _ = self.logger.info(
                    &format!("Flight {} cleared onto {} ({} -> {})", t.flight_id, runway, t.from, t.to),
                    Color::Cyan,
                );
            }
            if let Some(runway) = t.released {
                let _ = self.logger.info(
                    &format!("Flight {} vacated {} ({})", t.flight_id, runway, t.to),
                    Color::Blue,
                );
            }
        }
        for (id, phase) in &report.rejected {
            let _ = self.logger.error(&format!(
                "Flight {} cannot leave {}: invalid state transition",
                id, phase
            ));
        }
        for record in &report.retired {
            let _ = self.logger.info(
                &format!(
                    "Flight {} ({}) retired after {}",
                    record.flight_number, record.airline_name, record.final_phase
                ),
                Color::White,
            );
        }
    }
}
