use avn_protocol::errors::ProtocolError;
use billing::StageError;
use logger::LoggerError;
use thiserror::Error;

use super::flight_phase::FlightPhase;
use crate::config::ConfigError;

/// Represents errors that can occur in the control tower core.
#[derive(Debug, Error)]
pub enum SimError {
    /// The state machine was driven past a terminal phase or asked to skip one.
    #[error("Invalid state transition for flight {flight_id}: {from} has no successor on this branch")]
    InvalidStateTransition { flight_id: u32, from: FlightPhase },
    #[error("Flight {0} is not in the registry")]
    FlightNotFound(u32),
    #[error("Lock poisoned: {0}")]
    LockError(String),
    #[error("Timer lock error: {0}")]
    TimerLockError(String),
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
    #[error("Notification pipeline error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Logger error: {0}")]
    Logger(#[from] LoggerError),
    #[error("Billing pipeline error: {0}")]
    Billing(#[from] StageError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
