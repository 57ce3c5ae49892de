use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use avn_protocol::channel::{RecordReader, RecordWriter};
use avn_protocol::messages::avn_notice::AvnNotice;
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use avn_protocol::messages::payment_request::PaymentRequest;
use logger::{Color, Logger};

use crate::errors::{classify, Received, StageError};

/// Payment the airline makes for a notice. Airlines pay the full fine.
pub fn payment_for(notice: &AvnNotice) -> PaymentRequest {
    PaymentRequest {
        avn_id: notice.avn_id,
        aircraft_id: notice.aircraft_id,
        aircraft_type: notice.aircraft_type.clone(),
        total_fine: notice.total_fine,
    }
}

/// Airline side of the pipeline: pays every notice it is shown.
pub struct AirlinePortal<R: Read = UnixStream, W: Write = UnixStream> {
    notices: RecordReader<AvnNotice, R>,
    payments: RecordWriter<PaymentRequest, W>,
    logger: Logger,
}

impl<R: Read, W: Write> AirlinePortal<R, W> {
    pub fn new(
        notices: RecordReader<AvnNotice, R>,
        payments: RecordWriter<PaymentRequest, W>,
        logger: Logger,
    ) -> Self {
        AirlinePortal {
            notices,
            payments,
            logger,
        }
    }

    /// Runs until billing closes its end. Returns the payments submitted.
    pub fn run(mut self) -> Result<usize, StageError> {
        let mut submitted = 0;
        loop {
            let notice = match classify(self.notices.recv(), "airline portal", &self.logger)? {
                Received::Record(notice) => notice,
                Received::Skipped => continue,
                Received::Closed => break,
            };

            let request = payment_for(&notice);
            match self.payments.send(&request) {
                Ok(()) => {
                    submitted += 1;
                    let _ = self.logger.info(
                        &format!(
                            "{} pays AVN #{} for {}: {:.0}",
                            notice.airline_name,
                            notice.avn_id,
                            notice.flight_number,
                            request.total_fine
                        ),
                        Color::Cyan,
                    );
                }
                Err(e) => {
                    let _ = self.logger.error(&format!(
                        "Payment for AVN #{} not submitted: {}",
                        notice.avn_id, e
                    ));
                }
            }
        }
        Ok(submitted)
    }
}

/// Receipts the airline portal gets back from the payment processor.
pub struct PortalReceipts<R: Read = UnixStream> {
    confirmations: RecordReader<PaymentConfirmation, R>,
    logger: Logger,
}

impl<R: Read> PortalReceipts<R> {
    pub fn new(confirmations: RecordReader<PaymentConfirmation, R>, logger: Logger) -> Self {
        PortalReceipts {
            confirmations,
            logger,
        }
    }

    /// Runs until the payment processor closes its end. Returns the receipts
    /// showing a settled notice.
    pub fn run(mut self) -> Result<usize, StageError> {
        let mut paid = 0;
        loop {
            let receipt =
                match classify(self.confirmations.recv(), "airline portal", &self.logger)? {
                    Received::Record(receipt) => receipt,
                    Received::Skipped => continue,
                    Received::Closed => break,
                };

            if receipt.is_paid() {
                paid += 1;
            }
            let _ = self.logger.info(
                &format!("Receipt for AVN #{}: {}", receipt.avn_id, receipt.status.trim()),
                Color::White,
            );
        }
        Ok(paid)
    }
}
