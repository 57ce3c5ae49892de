//! Reference stages downstream of the control tower: the billing generator,
//! the airline portal and the payment processor.
//!
//! Every stage reads fixed-size records until its input channel closes, so
//! dropping the tower's notice writer shuts the whole pipeline down in order.

pub mod airline_portal;
pub mod billing_stage;
pub mod errors;
pub mod payment_processor;
pub mod pipeline;

pub use errors::StageError;
pub use pipeline::{BillingPipeline, PipelineSummary};
