use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use avn_protocol::channel::RecordWriter;
use avn_protocol::messages::avn_notice::AvnNotice;
use chrono::NaiveDateTime;
use logger::{Color, Logger};

use super::{
    aircraft::{AircraftType, Direction},
    flight::Flight,
    registry::FlightRegistry,
    runway::Runway,
    sim_error::SimError,
    violation::{Breach, ViolationLedger, ViolationNotice},
};

#[derive(Debug, Clone, Default)]
pub struct RadarReport {
    pub issued: Vec<ViolationNotice>,
    /// Notices that could not be handed to the billing stage.
    pub dropped: Vec<u32>,
}

/// Opens a violation episode on every flight outside its speed envelope or
/// on a restricted approach path.
///
/// Flights with an episode already open are skipped, so each episode yields
/// exactly one breach. A speed breach wins when both rules are broken.
pub fn detect(flights: &mut [Flight]) -> Vec<Breach> {
    flights
        .iter_mut()
        .filter(|f| !f.has_active_violation())
        .filter_map(|f| {
            let breach = match f.phase().envelope().breached_limit(f.speed()) {
                Some(allowed) => Breach::from_flight(f, allowed),
                None if on_restricted_approach(f) => Breach::restricted_approach(f),
                None => return None,
            };
            f.flag_violation();
            Some(breach)
        })
        .collect()
}

/// Northern cargo arrivals may only be brought in on runway C.
///
/// A flight holds its runway from the approach line-up until it turns off
/// onto the taxiway, so this only fires while it is landing.
pub fn on_restricted_approach(flight: &Flight) -> bool {
    flight.aircraft_type == AircraftType::Cargo
        && flight.direction == Direction::North
        && flight.runway().is_some_and(|r| r != Runway::C)
}

/// Speed monitor. Issues notices and forwards them to billing.
pub struct Radar<W: Write = UnixStream> {
    registry: Arc<FlightRegistry>,
    ledger: Arc<ViolationLedger>,
    outbox: RecordWriter<AvnNotice, W>,
    logger: Logger,
}

impl<W: Write> Radar<W> {
    pub fn new(
        registry: Arc<FlightRegistry>,
        ledger: Arc<ViolationLedger>,
        outbox: RecordWriter<AvnNotice, W>,
        logger: Logger,
    ) -> Self {
        Radar {
            registry,
            ledger,
            outbox,
            logger,
        }
    }

    /// One sweep of the airspace at simulated time `now`.
    ///
    /// Sending happens after the flight lock is released. A notice that
    /// cannot be sent stays in the ledger but is never retried.
    pub fn tick(&mut self, now: NaiveDateTime) -> Result<RadarReport, SimError> {
        let breaches = self.registry.with_flights(|flights| detect(flights))?;

        let mut report = RadarReport::default();
        for breach in breaches {
            let notice = self.ledger.issue(breach, now)?;
            let _ = self.logger.warn(&format!(
                "AVN #{} issued to {} ({}) for {}: {:.1} km/h in {}, limit {:.1}, fine {:.0}",
                notice.id,
                notice.flight_number,
                notice.airline_name,
                notice.kind,
                notice.recorded_speed,
                notice.phase,
                notice.allowed_speed,
                notice.fine_amount
            ));

            let sent = notice
                .to_wire()
                .and_then(|record| self.outbox.send(&record));
            if let Err(e) = sent {
                let _ = self
                    .logger
                    .error(&format!("AVN #{} not delivered to billing: {}", notice.id, e));
                report.dropped.push(notice.id);
            }
            report.issued.push(notice);
        }

        if !report.issued.is_empty() {
            let _ = self.logger.info(
                &format!("Radar sweep issued {} notice(s)", report.issued.len()),
                Color::Magenta,
            );
        }
        Ok(report)
    }

    pub fn into_outbox(self) -> RecordWriter<AvnNotice, W> {
        self.outbox
    }
}
