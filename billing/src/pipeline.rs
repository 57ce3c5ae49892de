use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use avn_protocol::channel::{channel, RecordReader, RecordWriter};
use avn_protocol::messages::avn_notice::AvnNotice;
use avn_protocol::messages::payment_confirmation::PaymentConfirmation;
use avn_protocol::messages::payment_request::PaymentRequest;
use logger::Logger;

use crate::airline_portal::{AirlinePortal, PortalReceipts};
use crate::billing_stage::{BillingBook, ConfirmationRelay, NoticeForwarder};
use crate::errors::StageError;
use crate::payment_processor::PaymentProcessor;

type StageHandle = JoinHandle<Result<usize, StageError>>;

/// Record counts reported by each stage once its input closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    pub billed: usize,
    pub payments_submitted: usize,
    pub payments_approved: usize,
    pub receipts_paid: usize,
    pub confirmations_relayed: usize,
}

/// The three downstream stages, each on its own threads.
///
/// The tower only holds the two channel ends passed to [`spawn`](Self::spawn).
/// Once it drops its notice writer every stage drains and exits in turn.
pub struct BillingPipeline {
    book: Arc<BillingBook>,
    forwarder: StageHandle,
    relay: StageHandle,
    portal: StageHandle,
    receipts: StageHandle,
    processor: StageHandle,
}

impl BillingPipeline {
    /// Wires billing, portal and payment together and starts them.
    ///
    /// Each stage logs to its own file under `log_dir`.
    pub fn spawn(
        log_dir: &Path,
        console: bool,
        from_core: RecordReader<AvnNotice>,
        to_core: RecordWriter<PaymentConfirmation>,
    ) -> Result<Self, StageError> {
        let billing_log = Logger::new(log_dir, "billing", console)?;
        let portal_log = Logger::new(log_dir, "airline_portal", console)?;
        let payment_log = Logger::new(log_dir, "payment_processor", console)?;

        let (billing_to_portal, portal_from_billing) = channel::<AvnNotice>()?;
        let (portal_to_payment, payment_from_portal) = channel::<PaymentRequest>()?;
        let (payment_to_billing, billing_from_payment) = channel::<PaymentConfirmation>()?;
        let (payment_to_portal, portal_from_payment) = channel::<PaymentConfirmation>()?;

        let book = Arc::new(BillingBook::new());

        let forwarder = NoticeForwarder::new(
            from_core,
            billing_to_portal,
            Arc::clone(&book),
            billing_log.clone(),
        );
        let relay = ConfirmationRelay::new(
            billing_from_payment,
            to_core,
            Arc::clone(&book),
            billing_log,
        );
        let portal = AirlinePortal::new(portal_from_billing, portal_to_payment, portal_log.clone());
        let receipts = PortalReceipts::new(portal_from_payment, portal_log);
        let processor = PaymentProcessor::new(
            payment_from_portal,
            payment_to_billing,
            payment_to_portal,
            payment_log,
        );

        Ok(BillingPipeline {
            book,
            forwarder: spawn_stage("billing-notices", move || forwarder.run())?,
            relay: spawn_stage("billing-confirmations", move || relay.run())?,
            portal: spawn_stage("airline-portal", move || portal.run())?,
            receipts: spawn_stage("airline-receipts", move || receipts.run())?,
            processor: spawn_stage("payment-processor", move || processor.run())?,
        })
    }

    /// What billing has recorded so far.
    pub fn book(&self) -> Arc<BillingBook> {
        Arc::clone(&self.book)
    }

    /// Waits for every stage to drain. Call after the tower dropped its
    /// notice writer, otherwise this blocks forever.
    pub fn join(self) -> Result<PipelineSummary, StageError> {
        Ok(PipelineSummary {
            billed: join_stage(self.forwarder, "billing-notices")?,
            payments_submitted: join_stage(self.portal, "airline-portal")?,
            payments_approved: join_stage(self.processor, "payment-processor")?,
            receipts_paid: join_stage(self.receipts, "airline-receipts")?,
            confirmations_relayed: join_stage(self.relay, "billing-confirmations")?,
        })
    }
}

fn spawn_stage(
    name: &'static str,
    stage: impl FnOnce() -> Result<usize, StageError> + Send + 'static,
) -> Result<StageHandle, StageError> {
    Ok(thread::Builder::new().name(name.to_string()).spawn(stage)?)
}

fn join_stage(handle: StageHandle, name: &'static str) -> Result<usize, StageError> {
    handle.join().map_err(|_| StageError::Panicked(name))?
}
