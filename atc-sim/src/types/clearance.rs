use std::io::Read;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use avn_protocol::channel::RecordReader;
use avn_protocol::errors::ProtocolError;
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use logger::{Color, Logger};

use super::{registry::FlightRegistry, sim_error::SimError, violation::ViolationLedger};

/// What a single payment confirmation changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Clearance {
    /// The notice is now paid. `flight_cleared` is false when the flight had
    /// already been retired.
    Settled {
        avn_id: u32,
        flight_id: u32,
        flight_cleared: bool,
    },
    Declined { avn_id: i32, status: String },
    /// No unpaid notice has this id.
    Unknown { avn_id: i32 },
}

/// Applies payment confirmations relayed by the billing stage.
pub struct ClearanceListener<R: Read = UnixStream> {
    registry: Arc<FlightRegistry>,
    ledger: Arc<ViolationLedger>,
    inbox: RecordReader<PaymentConfirmation, R>,
    logger: Logger,
}

impl<R: Read> ClearanceListener<R> {
    pub fn new(
        registry: Arc<FlightRegistry>,
        ledger: Arc<ViolationLedger>,
        inbox: RecordReader<PaymentConfirmation, R>,
        logger: Logger,
    ) -> Self {
        ClearanceListener {
            registry,
            ledger,
            inbox,
            logger,
        }
    }

    /// Waits for the next confirmation.
    ///
    /// `Ok(None)` means the read timed out or the record was unreadable. A
    /// closed channel is returned as `ProtocolError::ChannelClosed`.
    pub fn poll(&mut self) -> Result<Option<Clearance>, SimError> {
        match self.inbox.recv() {
            Ok(confirmation) => self.apply(confirmation).map(Some),
            Err(e) if e.is_timeout() => Ok(None),
            Err(ProtocolError::ChannelClosed) => Err(ProtocolError::ChannelClosed.into()),
            Err(e) => {
                let _ = self
                    .logger
                    .error(&format!("Unreadable payment confirmation dropped: {}", e));
                Ok(None)
            }
        }
    }

    fn apply(&self, confirmation: PaymentConfirmation) -> Result<Clearance, SimError> {
        if !confirmation.is_paid() {
            let _ = self.logger.warn(&format!(
                "AVN #{} not settled: status '{}'",
                confirmation.avn_id, confirmation.status
            ));
            return Ok(Clearance::Declined {
                avn_id: confirmation.avn_id,
                status: confirmation.status,
            });
        }

        let settled = match u32::try_from(confirmation.avn_id) {
            Ok(id) => self.ledger.mark_paid(id)?,
            Err(_) => None,
        };

        let Some(notice) = settled else {
            let _ = self.logger.warn(&format!(
                "Payment for unknown or settled AVN #{} ignored",
                confirmation.avn_id
            ));
            return Ok(Clearance::Unknown {
                avn_id: confirmation.avn_id,
            });
        };

        let flight_cleared = self.registry.clear_violation(notice.flight_id)?;
        let unpaid = self.ledger.outstanding_for(notice.flight_id)?;
        let _ = self.logger.info(
            &format!(
                "AVN #{} paid by {}, {} cleared ({} unpaid left)",
                notice.id, notice.airline_name, notice.flight_number, unpaid
            ),
            Color::Green,
        );

        Ok(Clearance::Settled {
            avn_id: notice.id,
            flight_id: notice.flight_id,
            flight_cleared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::aircraft::{AircraftType, Direction};
    use crate::types::test_support::{at, flight};
    use crate::types::violation::Breach;
    use avn_protocol::Serializable;
    use std::io::Cursor;

    fn listener(
        confirmations: &[PaymentConfirmation],
    ) -> (
        tempfile::TempDir,
        Arc<FlightRegistry>,
        Arc<ViolationLedger>,
        ClearanceListener<Cursor<Vec<u8>>>,
    ) {
        let bytes: Vec<u8> = confirmations
            .iter()
            .flat_map(|c| c.to_bytes().unwrap())
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), "clearance", false).unwrap();
        let registry = Arc::new(FlightRegistry::new());
        let ledger = Arc::new(ViolationLedger::new());
        let listener = ClearanceListener::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            RecordReader::new(Cursor::new(bytes)),
            logger,
        );
        (dir, registry, ledger, listener)
    }

    fn violate(registry: &FlightRegistry, ledger: &ViolationLedger, id: u32) -> u32 {
        let mut f = flight(id, AircraftType::Commercial, Direction::North);
        f.flag_violation();
        let notice = ledger.issue(Breach::from_flight(&f, 600.0), at(0)).unwrap();
        registry.add(f).unwrap();
        notice.id
    }

    #[test]
    fn test_payment_clears_the_flight() {
        let (_dir, registry, ledger, mut listener) =
            listener(&[PaymentConfirmation::paid(1), PaymentConfirmation::paid(1)]);
        violate(&registry, &ledger, 7);

        let first = listener.poll().unwrap();
        let second = listener.poll().unwrap();

        assert_eq!(
            first,
            Some(Clearance::Settled {
                avn_id: 1,
                flight_id: 7,
                flight_cleared: true
            })
        );
        assert_eq!(second, Some(Clearance::Unknown { avn_id: 1 }));
        assert!(!registry.lookup(7).unwrap().found().unwrap().has_active_violation());
        assert!(ledger.snapshot().unwrap()[0].paid);
    }

    #[test]
    fn test_declined_payment_keeps_the_episode_open() {
        let (_dir, registry, ledger, mut listener) = listener(&[PaymentConfirmation::declined(1)]);
        violate(&registry, &ledger, 7);

        let outcome = listener.poll().unwrap();

        assert!(matches!(outcome, Some(Clearance::Declined { avn_id: 1, .. })));
        assert!(registry.lookup(7).unwrap().found().unwrap().has_active_violation());
        assert_eq!(ledger.outstanding_for(7).unwrap(), 1);
    }

    #[test]
    fn test_payment_for_retired_flight_still_settles() {
        let (_dir, _registry, ledger, mut listener) = listener(&[PaymentConfirmation::paid(1)]);
        let f = flight(9, AircraftType::Cargo, Direction::East);
        ledger.issue(Breach::from_flight(&f, 30.0), at(0)).unwrap();

        let outcome = listener.poll().unwrap();

        assert_eq!(
            outcome,
            Some(Clearance::Settled {
                avn_id: 1,
                flight_id: 9,
                flight_cleared: false
            })
        );
    }

    #[test]
    fn test_closed_channel_is_reported() {
        let (_dir, _registry, _ledger, mut listener) = listener(&[]);

        assert!(matches!(
            listener.poll(),
            Err(SimError::Protocol(ProtocolError::ChannelClosed))
        ));
    }

    #[test]
    fn test_negative_id_is_unknown() {
        let (_dir, _registry, _ledger, mut listener) = listener(&[PaymentConfirmation::paid(-4)]);

        assert_eq!(listener.poll().unwrap(), Some(Clearance::Unknown { avn_id: -4 }));
    }
}
