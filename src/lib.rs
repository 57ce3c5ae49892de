//! AirControlX: runway arbitration and airspace violation billing.
//!
//! The workspace is split the same way the running system is: the core
//! simulation in [`atc_sim`], the wire records in [`avn_protocol`], the
//! external billing stages in [`billing`] and the shared [`logger`].

pub use atc_sim;
pub use avn_protocol;
pub use billing;
pub use logger;
