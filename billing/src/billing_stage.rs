use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex, MutexGuard};

use avn_protocol::channel::{RecordReader, RecordWriter};
use avn_protocol::messages::avn_notice::AvnNotice;
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use logger::{Color, Logger};

use crate::errors::{classify, Received, StageError};

/// A notice as billed to its airline.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingEntry {
    pub notice: AvnNotice,
    pub paid: bool,
}

/// Notices billed so far, keyed by notice id. Shared by both halves of the
/// billing stage.
#[derive(Debug, Default)]
pub struct BillingBook {
    entries: Mutex<BTreeMap<i32, BillingEntry>>,
}

impl BillingBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bills `notice`. Returns `false` if the id was already billed.
    pub fn record(&self, notice: AvnNotice) -> Result<bool, StageError> {
        let mut entries = self.lock()?;
        if entries.contains_key(&notice.avn_id) {
            return Ok(false);
        }
        entries.insert(notice.avn_id, BillingEntry { notice, paid: false });
        Ok(true)
    }

    /// Marks a billed notice as paid. Returns `false` for unknown ids.
    pub fn settle(&self, avn_id: i32) -> Result<bool, StageError> {
        match self.lock()?.get_mut(&avn_id) {
            Some(entry) => {
                entry.paid = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, avn_id: i32) -> Result<Option<BillingEntry>, StageError> {
        Ok(self.lock()?.get(&avn_id).cloned())
    }

    pub fn len(&self) -> Result<usize, StageError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StageError> {
        Ok(self.lock()?.is_empty())
    }

    /// Sum of the fines still unpaid.
    pub fn outstanding(&self) -> Result<f64, StageError> {
        Ok(self
            .lock()?
            .values()
            .filter(|e| !e.paid)
            .map(|e| e.notice.total_fine)
            .sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<i32, BillingEntry>>, StageError> {
        self.entries
            .lock()
            .map_err(|_| StageError::LockError("billing book".to_string()))
    }
}

/// Receives notices from the tower, bills them and passes them to the
/// airline portal.
pub struct NoticeForwarder<R: Read = UnixStream, W: Write = UnixStream> {
    from_core: RecordReader<AvnNotice, R>,
    to_portal: RecordWriter<AvnNotice, W>,
    book: Arc<BillingBook>,
    logger: Logger,
}

impl<R: Read, W: Write> NoticeForwarder<R, W> {
    pub fn new(
        from_core: RecordReader<AvnNotice, R>,
        to_portal: RecordWriter<AvnNotice, W>,
        book: Arc<BillingBook>,
        logger: Logger,
    ) -> Self {
        NoticeForwarder {
            from_core,
            to_portal,
            book,
            logger,
        }
    }

    /// Runs until the tower closes its end. Returns the notices billed.
    pub fn run(mut self) -> Result<usize, StageError> {
        let mut billed = 0;
        loop {
            let notice = match classify(self.from_core.recv(), "billing", &self.logger)? {
                Received::Record(notice) => notice,
                Received::Skipped => continue,
                Received::Closed => break,
            };

            if !self.book.record(notice.clone())? {
                let _ = self
                    .logger
                    .warn(&format!("AVN #{} already billed, ignored", notice.avn_id));
                continue;
            }
            billed += 1;

            let issued = notice
                .issued_at()
                .map_or_else(|| "unknown time".to_string(), |t| t.format("%H:%M:%S").to_string());
            let _ = self.logger.info(
                &format!(
                    "AVN #{} billed to {}: {} {} at {:.1} km/h (limit {:.1}), fine {:.0}, issued {}",
                    notice.avn_id,
                    notice.airline_name,
                    notice.aircraft_type,
                    notice.flight_number,
                    notice.recorded_speed,
                    notice.allowed_speed,
                    notice.total_fine,
                    issued
                ),
                Color::Yellow,
            );

            if let Err(e) = self.to_portal.send(&notice) {
                let _ = self.logger.error(&format!(
                    "AVN #{} not delivered to the airline portal: {}",
                    notice.avn_id, e
                ));
            }
        }

        let _ = self.logger.info(
            &format!("Notice channel closed after {} notices", billed),
            Color::White,
        );
        Ok(billed)
    }
}

/// Receives confirmations from the payment processor, settles the bill and
/// relays the confirmation to the tower.
pub struct ConfirmationRelay<R: Read = UnixStream, W: Write = UnixStream> {
    from_payment: RecordReader<PaymentConfirmation, R>,
    to_core: RecordWriter<PaymentConfirmation, W>,
    book: Arc<BillingBook>,
    logger: Logger,
}

impl<R: Read, W: Write> ConfirmationRelay<R, W> {
    pub fn new(
        from_payment: RecordReader<PaymentConfirmation, R>,
        to_core: RecordWriter<PaymentConfirmation, W>,
        book: Arc<BillingBook>,
        logger: Logger,
    ) -> Self {
        ConfirmationRelay {
            from_payment,
            to_core,
            book,
            logger,
        }
    }

    /// Runs until the payment processor closes its end. Returns the
    /// confirmations relayed.
    pub fn run(mut self) -> Result<usize, StageError> {
        let mut relayed = 0;
        loop {
            let confirmation =
                match classify(self.from_payment.recv(), "billing", &self.logger)? {
                    Received::Record(confirmation) => confirmation,
                    Received::Skipped => continue,
                    Received::Closed => break,
                };

            if confirmation.is_paid() && !self.book.settle(confirmation.avn_id)? {
                let _ = self.logger.warn(&format!(
                    "Payment for AVN #{} that was never billed",
                    confirmation.avn_id
                ));
            }

            match self.to_core.send(&confirmation) {
                Ok(()) => {
                    relayed += 1;
                    let _ = self.logger.info(
                        &format!(
                            "AVN #{} {}, relayed to the tower",
                            confirmation.avn_id,
                            confirmation.status.trim()
                        ),
                        Color::Green,
                    );
                }
                Err(e) => {
                    let _ = self.logger.error(&format!(
                        "Confirmation for AVN #{} not delivered to the tower: {}",
                        confirmation.avn_id, e
                    ));
                }
            }
        }
        Ok(relayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avn_protocol::{Record, Serializable};
    use std::io::Cursor;

    fn notice(avn_id: i32, airline: &str, fine: f64) -> AvnNotice {
        AvnNotice {
            avn_id,
            aircraft_id: avn_id + 100,
            flight_number: format!("{}-101", airline),
            airline_name: airline.to_string(),
            aircraft_type: "Commercial".to_string(),
            recorded_speed: 650.0,
            allowed_speed: 600.0,
            total_fine: fine,
            timestamp: 1_700_000_000,
        }
    }

    fn encode<T: Serializable>(records: &[T]) -> Cursor<Vec<u8>> {
        Cursor::new(records.iter().flat_map(|r| r.to_bytes().unwrap()).collect())
    }

    #[test]
    fn test_book_tracks_outstanding_fines() {
        let book = BillingBook::new();

        assert!(book.record(notice(1, "PIA", 575_000.0)).unwrap());
        assert!(book.record(notice(2, "FedEx", 805_000.0)).unwrap());
        assert!(!book.record(notice(1, "PIA", 575_000.0)).unwrap());
        assert_eq!(book.outstanding().unwrap(), 1_380_000.0);

        assert!(book.settle(2).unwrap());
        assert!(!book.settle(3).unwrap());
        assert_eq!(book.outstanding().unwrap(), 575_000.0);
        assert!(book.get(2).unwrap().unwrap().paid);
    }

    #[test]
    fn test_forwarder_bills_and_forwards_each_notice_once() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), "billing", false).unwrap();
        let book = Arc::new(BillingBook::new());
        let input = encode(&[
            notice(1, "PIA", 575_000.0),
            notice(1, "PIA", 575_000.0),
            notice(2, "AirBlue", 575_000.0),
        ]);
        let forwarder = NoticeForwarder::new(
            RecordReader::new(input),
            RecordWriter::new(Vec::new()),
            Arc::clone(&book),
            logger,
        );

        let billed = forwarder.run().unwrap();

        assert_eq!(billed, 2);
        assert_eq!(book.len().unwrap(), 2);
        let log = std::fs::read_to_string(dir.path().join("billing.log")).unwrap();
        assert!(log.contains("AVN #2 billed to AirBlue"));
        assert!(log.contains("issued 22:13:20"));
    }

    #[test]
    fn test_forwarded_bytes_reach_the_portal() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), "billing", false).unwrap();
        let (to_portal, mut portal) = avn_protocol::channel::channel::<AvnNotice>().unwrap();
        let forwarder = NoticeForwarder::new(
            RecordReader::new(encode(&[notice(5, "Blue Dart", 805_000.0)])),
            to_portal,
            Arc::new(BillingBook::new()),
            logger,
        );

        forwarder.run().unwrap();

        assert_eq!(portal.recv().unwrap(), notice(5, "Blue Dart", 805_000.0));
        assert!(portal.recv().is_err());
    }

    #[test]
    fn test_relay_settles_and_forwards() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), "billing", false).unwrap();
        let book = Arc::new(BillingBook::new());
        book.record(notice(1, "PIA", 575_000.0)).unwrap();
        let relay = ConfirmationRelay::new(
            RecordReader::new(encode(&[
                PaymentConfirmation::paid(1),
                PaymentConfirmation::declined(9),
            ])),
            RecordWriter::new(Vec::new()),
            Arc::clone(&book),
            logger,
        );

        assert_eq!(relay.run().unwrap(), 2);
        assert!(book.get(1).unwrap().unwrap().paid);
        assert_eq!(book.outstanding().unwrap(), 0.0);
    }

    #[test]
    fn test_truncated_tail_ends_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), "billing", false).unwrap();
        let mut bytes = notice(1, "PIA", 1.0).to_bytes().unwrap();
        bytes.extend_from_slice(&[0u8; AvnNotice::SIZE / 2]);
        let forwarder = NoticeForwarder::new(
            RecordReader::new(Cursor::new(bytes)),
            RecordWriter::new(Vec::new()),
            Arc::new(BillingBook::new()),
            logger,
        );

        assert_eq!(forwarder.run().unwrap(), 1);
    }
}
