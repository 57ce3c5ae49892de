use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use avn_protocol::channel::{RecordReader, RecordWriter};
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use avn_protocol::messages::payment_request::PaymentRequest;
use logger::{Color, Logger};

use crate::errors::{classify, Received, StageError};

/// Approves any request for a positive, finite amount.
pub fn authorize(request: &PaymentRequest) -> PaymentConfirmation {
    if request.total_fine.is_finite() && request.total_fine > 0.0 {
        PaymentConfirmation::paid(request.avn_id)
    } else {
        PaymentConfirmation::declined(request.avn_id)
    }
}

/// Settles payment requests and reports the outcome to both billing and the
/// airline portal.
pub struct PaymentProcessor<R: Read = UnixStream, B: Write = UnixStream, P: Write = UnixStream> {
    requests: RecordReader<PaymentRequest, R>,
    to_billing: RecordWriter<PaymentConfirmation, B>,
    to_portal: RecordWriter<PaymentConfirmation, P>,
    logger: Logger,
}

impl<R: Read, B: Write, P: Write> PaymentProcessor<R, B, P> {
    pub fn new(
        requests: RecordReader<PaymentRequest, R>,
        to_billing: RecordWriter<PaymentConfirmation, B>,
        to_portal: RecordWriter<PaymentConfirmation, P>,
        logger: Logger,
    ) -> Self {
        PaymentProcessor {
            requests,
            to_billing,
            to_portal,
            logger,
        }
    }

    /// Runs until the portal closes its end. Returns the requests approved.
    pub fn run(mut self) -> Result<usize, StageError> {
        let mut approved = 0;
        loop {
            let request = match classify(self.requests.recv(), "payment", &self.logger)? {
                Received::Record(request) => request,
                Received::Skipped => continue,
                Received::Closed => break,
            };

            let confirmation = authorize(&request);
            if confirmation.is_paid() {
                approved += 1;
                let _ = self.logger.info(
                    &format!(
                        "AVN #{} charged {:.0} ({})",
                        request.avn_id, request.total_fine, request.aircraft_type
                    ),
                    Color::Green,
                );
            } else {
                let _ = self.logger.warn(&format!(
                    "AVN #{} declined: invalid amount {}",
                    request.avn_id, request.total_fine
                ));
            }

            if let Err(e) = self.to_billing.send(&confirmation) {
                let _ = self.logger.error(&format!(
                    "Confirmation for AVN #{} not delivered to billing: {}",
                    request.avn_id, e
                ));
            }
            if let Err(e) = self.to_portal.send(&confirmation) {
                let _ = self.logger.error(&format!(
                    "Receipt for AVN #{} not delivered to the airline portal: {}",
                    request.avn_id, e
                ));
            }
        }
        Ok(approved)
    }
}
